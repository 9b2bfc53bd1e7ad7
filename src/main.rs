use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    pulsar::repl::start(config_path.as_deref())
}
