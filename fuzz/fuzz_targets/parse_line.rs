#![no_main]

use libfuzzer_sys::fuzz_target;
use uoccin_core::command::parser::{ParsedLine, parse_line};
use uoccin_core::command::writer::to_line;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    // Any command that parses must survive a write/parse cycle unchanged.
    if let Ok(ParsedLine::Command(command)) = parse_line(line)
        && let Ok(written) = to_line(&command)
    {
        let reparsed = parse_line(&written).expect("written line parses");
        assert_eq!(reparsed, ParsedLine::Command(command));
    }
});
