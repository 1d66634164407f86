fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match wikisearch_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) if !error.use_stderr() => {
            print!("{error}");
            return;
        }
        Err(error) => {
            eprintln!("[wikisearch-core] {error}");
            std::process::exit(2);
        }
    };

    if let Err(error) = wikisearch_core::runtime::run_with_options(options) {
        eprintln!("[wikisearch-core] runtime failed: {error}");
        std::process::exit(1);
    }
}
