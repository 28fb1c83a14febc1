use postmerge_gcode::{merge_fragments, GcodeLine, MergeOptions};
use postmerge_settings::Settings;
use proptest::prelude::*;

fn body_line() -> impl Strategy<Value = String> {
    (0usize..5, -50i32..50, -50i32..50, any::<bool>()).prop_map(|(kind, a, b, numbered)| {
        let text = match kind {
            0 => format!("G0 X{a} Y{b}"),
            1 => format!("G1 X{a} Y{b} F100"),
            2 => format!("G1 Z{} F50", a / 5),
            3 => format!("X{a}"),
            _ => "(note)".to_string(),
        };
        if numbered {
            format!("N{} {}", a + 100, text)
        } else {
            text
        }
    })
}

fn fragment() -> impl Strategy<Value = (u32, Vec<String>)> {
    (1u32..4, prop::collection::vec(body_line(), 0..8))
}

fn render((tool, body): &(u32, Vec<String>)) -> String {
    let mut text = format!("%\nO0001 (postmerge_tmp)\nN5 G90 G21\nN10 T{tool} M6\n");
    for line in body {
        text.push_str(line);
        text.push('\n');
    }
    text.push_str("N90 M5\nN95 M30\n%\n");
    text
}

fn payloads(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| GcodeLine::parse(l).payload().to_string())
        .collect()
}

proptest! {
    #[test]
    fn renumbered_lines_are_consecutive(fragments in prop::collection::vec(fragment(), 1..5)) {
        let texts: Vec<String> = fragments.iter().map(render).collect();
        let out = merge_fragments(&texts, MergeOptions::default()).unwrap();

        let numbers: Vec<u32> = out
            .lines()
            .filter_map(|l| GcodeLine::parse(l).line_number)
            .collect();
        let expected: Vec<u32> = (0..numbers.len() as u32).map(|i| 10 + 5 * i).collect();
        prop_assert_eq!(numbers, expected);
    }

    #[test]
    fn body_lines_are_kept_in_order(fragments in prop::collection::vec(fragment(), 1..5)) {
        let texts: Vec<String> = fragments.iter().map(render).collect();
        let out = merge_fragments(&texts, MergeOptions::default()).unwrap();

        let mut expected = vec![
            "%".to_string(),
            "O0001 (postmerge_tmp)".to_string(),
            "G90 G21".to_string(),
        ];
        let mut previous_tool = None;
        for (tool, body) in &fragments {
            if previous_tool != Some(*tool) {
                expected.push(format!("T{tool} M6"));
            }
            previous_tool = Some(*tool);
            expected.extend(body.iter().map(|l| GcodeLine::parse(l).payload().to_string()));
        }
        expected.extend(["M5", "M30", "%"].map(String::from));

        prop_assert_eq!(payloads(&out), expected);
    }

    #[test]
    fn merging_twice_gives_identical_output(
        fragments in prop::collection::vec(fragment(), 1..5),
        rewrite in any::<bool>(),
    ) {
        let texts: Vec<String> = fragments.iter().map(render).collect();
        let mut settings = Settings::default();
        settings.rapid.enabled = rewrite;

        let first = merge_fragments(&texts, MergeOptions::from_settings(&settings)).unwrap();
        let second = merge_fragments(&texts, MergeOptions::from_settings(&settings)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rapid_rewriting_keeps_lines_and_positions(fragments in prop::collection::vec(fragment(), 1..5)) {
        let texts: Vec<String> = fragments.iter().map(render).collect();
        let plain = merge_fragments(&texts, MergeOptions::default()).unwrap();

        let mut settings = Settings::default();
        settings.rapid.enabled = true;
        let rewritten = merge_fragments(&texts, MergeOptions::from_settings(&settings)).unwrap();

        let plain: Vec<GcodeLine> = plain.lines().map(GcodeLine::parse).collect();
        let rewritten: Vec<GcodeLine> = rewritten.lines().map(GcodeLine::parse).collect();
        prop_assert_eq!(plain.len(), rewritten.len());

        for (a, b) in plain.iter().zip(&rewritten) {
            prop_assert_eq!(a.line_number, b.line_number);
            for axis in ['X', 'Y', 'Z'] {
                prop_assert_eq!(a.value(axis).unwrap(), b.value(axis).unwrap());
            }
        }
    }
}
