use histsh::config::ShellConfig;
use histsh::repl::start_repl;

fn main() {
    histsh::init_logging();
    let config = ShellConfig::from_env();
    match start_repl(&config) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("histsh: {:#}", err);
            std::process::exit(1);
        }
    }
}
