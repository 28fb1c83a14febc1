//! Setup and operation data model
//!
//! These types stand in for the host CAM document: a setup owns an ordered list of
//! operations, and operations are grouped so that each group maps to exactly one
//! post processor invocation.

use serde::{Deserialize, Serialize};

/// Tool identity as seen by the post processor (the `T` number)
pub type ToolNumber = u32;

/// One machining step within a setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name as shown in the CAM browser
    pub name: String,
    /// Tool used by the operation, if any
    #[serde(default)]
    pub tool: Option<ToolNumber>,
    /// Whether the operation produces G-code motion of its own
    #[serde(default = "default_true")]
    pub has_toolpath: bool,
    /// Suppressed operations are never posted
    #[serde(default)]
    pub suppressed: bool,
}

fn default_true() -> bool {
    true
}

impl Operation {
    /// Create a cutting operation using `tool`
    pub fn cutting(name: impl Into<String>, tool: ToolNumber) -> Self {
        Self {
            name: name.into(),
            tool: Some(tool),
            has_toolpath: true,
            suppressed: false,
        }
    }

    /// Create an operation without a toolpath (manual NC, comments, stops)
    pub fn manual(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool: None,
            has_toolpath: false,
            suppressed: false,
        }
    }

    /// Whether this operation contributes a tool identity to its group
    pub fn is_tool_bearing(&self) -> bool {
        self.has_toolpath && self.tool.is_some()
    }
}

/// A named collection of operations sharing work coordinates and stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    /// Setup name; colons separate output subfolders from the file name
    pub name: String,
    /// Suppressed setups are skipped
    #[serde(default)]
    pub suppressed: bool,
    /// Operations in browser order
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Setup {
    /// Create an empty setup
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suppressed: false,
            operations: Vec::new(),
        }
    }

    /// Add an operation (builder style)
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Operations that take part in posting
    pub fn active_operations(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| !op.suppressed)
            .cloned()
            .collect()
    }
}

/// Operations posted together in one post processor invocation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationGroup {
    operations: Vec<Operation>,
    tool: Option<ToolNumber>,
}

impl OperationGroup {
    /// Start a group with its first operation
    pub fn new(first: Operation) -> Self {
        let tool = if first.is_tool_bearing() {
            first.tool
        } else {
            None
        };
        Self {
            operations: vec![first],
            tool,
        }
    }

    /// Append an operation, adopting its tool if the group has none yet
    pub fn push(&mut self, operation: Operation) {
        if self.tool.is_none() && operation.is_tool_bearing() {
            self.tool = operation.tool;
        }
        self.operations.push(operation);
    }

    /// Operations in posting order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The group's tool identity
    pub fn tool(&self) -> Option<ToolNumber> {
        self.tool
    }

    /// Whether any operation in the group has a toolpath
    pub fn has_toolpath(&self) -> bool {
        self.operations.iter().any(|op| op.has_toolpath)
    }

    /// Comma-separated operation names, used in error messages
    pub fn names(&self) -> String {
        self.operations
            .iter()
            .map(|op| op.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Groups are never empty; provided for API symmetry
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_adopts_first_tool() {
        let mut group = OperationGroup::new(Operation::manual("Probe note"));
        assert_eq!(group.tool(), None);
        group.push(Operation::cutting("Face1", 3));
        assert_eq!(group.tool(), Some(3));
        assert_eq!(group.names(), "Probe note, Face1");
        assert!(group.has_toolpath());
    }

    #[test]
    fn test_active_operations_skip_suppressed() {
        let mut hidden = Operation::cutting("Old", 1);
        hidden.suppressed = true;
        let setup = Setup::new("Top")
            .with_operation(hidden)
            .with_operation(Operation::cutting("Face1", 1));
        let active = setup.active_operations();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Face1");
    }

    #[test]
    fn test_operation_manifest_defaults() {
        let op: Operation = serde_json::from_str(r#"{"name": "Contour", "tool": 4}"#).unwrap();
        assert!(op.has_toolpath);
        assert!(!op.suppressed);
        assert!(op.is_tool_bearing());
    }
}
