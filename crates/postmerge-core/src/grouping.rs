//! Operation grouping
//!
//! Splits a setup's operations into groups that can each be posted with a single
//! post processor invocation and a single tool.

use crate::operation::{Operation, OperationGroup};

/// Group operations so each group carries at most one tool identity.
///
/// Operations without a toolpath are absorbed into the group in progress. A
/// tool-bearing operation joins the current group when the group has no tool yet or
/// uses the same tool; a different tool starts a new group.
pub fn group_operations(operations: &[Operation]) -> Vec<OperationGroup> {
    let mut groups: Vec<OperationGroup> = Vec::new();
    let mut iter = operations.iter().filter(|op| !op.suppressed);

    let Some(first) = iter.next() else {
        return groups;
    };
    let mut current = OperationGroup::new(first.clone());

    for op in iter {
        let starts_new_group = op.is_tool_bearing()
            && current.tool().is_some()
            && current.tool() != op.tool;

        if starts_new_group {
            let finished = std::mem::replace(&mut current, OperationGroup::new(op.clone()));
            groups.push(finished);
        } else {
            current.push(op.clone());
        }
    }
    groups.push(current);

    tracing::debug!(
        "Grouped {} operations into {} groups",
        operations.len(),
        groups.len()
    );
    groups
}

/// Put every active operation in one group, for single-invocation posting.
pub fn single_group(operations: &[Operation]) -> Vec<OperationGroup> {
    let mut iter = operations.iter().filter(|op| !op.suppressed);
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let mut group = OperationGroup::new(first.clone());
    for op in iter {
        group.push(op.clone());
    }
    vec![group]
}
