use std::io::{stderr, stdout};
use std::process::ExitCode;

use mdl::{run, MdlParser};

fn main() -> ExitCode {
    env_logger::init();
    let status = run(std::env::args_os(), &MdlParser, &mut stdout().lock(), &mut stderr().lock());
    ExitCode::from(status.code())
}
