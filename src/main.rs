use chatsync::cli::{self, CliContext, CliInvocation, CliRunError};
use std::io::{self, Write};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), CliRunError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Command(command) => {
            let context = CliContext::from_env()?;
            cli::run(command, &context)
        }
    }
}

fn print_help() {
    let text = format!(
        "{name} - terminal client for the chat system API\n\nUSAGE:\n  {name} [chat] [--session ID] [--scope NAME] [--no-persist]  Private conversation (default)\n  {name} lobby                            Shared conversation everyone joins\n  {name} history <session-id>             Print a conversation\n  {name} sessions                         List known sessions\n  {name} health                           Check the API\n  {name} account [show|set <name>|reset]  Display name used for your messages\n  {name} theme [light|dark|toggle]        Color theme\n  {name} --help | --version\n\nCHAT FLAGS:\n  --session ID   Open this session instead of the remembered one\n  --scope NAME   Keep a separate remembered session per scope (default: default)\n  --no-persist   Do not read or remember the session id\n\nCHAT COMMANDS:\n  /new [id]  /join <id>  /clear  /name <name>  /theme  /status  /quit\n\nOUTPUT:\n  history: time<TAB>author<TAB>content\n  sessions: session_id<TAB>message_count\n\nENV:\n  CHATSYNC_API_URL            API base URL (default: http://localhost:8000/v1)\n  CHATSYNC_STATE_DIR          Local state dir (default: ~/.chatsync)\n  CHATSYNC_HTTP_TIMEOUT_SECS  Request timeout (default: 10)\n  RUST_LOG                    Log filter (default: warn)\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}
