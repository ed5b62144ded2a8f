#![no_main]

use libfuzzer_sys::fuzz_target;
use uoccin_core::command::parser::{ParsedLine, parse_line};
use uoccin_core::config::FormatConfig;
use uoccin_core::reduce::reduce;
use uoccin_core::store::StateStore;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let commands: Vec<_> = text
        .lines()
        .filter_map(|line| match parse_line(line) {
            Ok(ParsedLine::Command(c)) => Some(c),
            _ => None,
        })
        .collect();

    let reduction = reduce(StateStore::default(), &commands, &FormatConfig::default());
    assert!(
        reduction.store.invariant_violations().is_empty(),
        "{:?}",
        reduction.store.invariant_violations()
    );
});
