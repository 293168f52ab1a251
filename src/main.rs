mod guest;
#[cfg(not(target_arch = "wasm32"))]
mod host;
#[cfg(not(target_arch = "wasm32"))]
mod model;
#[cfg(all(feature = "plugins", not(target_arch = "wasm32")))]
mod plugin;

#[cfg(target_arch = "wasm32")]
fn main() {
    use crate::guest::wasi::{HostMagic, WasiConsole, WasiFs};

    guest::GuestEntry::new(WasiConsole, HostMagic, WasiFs).run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use anyhow::Result;
    use clap::{Parser, Subcommand};
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    use crate::guest::GuestEntry;
    use crate::host::StdoutConsole;
    use crate::model::config::HostConfig;

    #[derive(Parser)]
    #[command(name = "mosaic", version, about = "Run guest modules against host capabilities")]
    struct Cli {
        /// Config file to use instead of the user config.
        #[arg(long, global = true)]
        config: Option<PathBuf>,
        /// Log to stderr instead of the log file.
        #[arg(long, global = true)]
        log_stderr: bool,
        #[command(subcommand)]
        command: Option<Command>,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Run the built-in guest routine.
        Guest,
        /// List configured wasm modules.
        #[cfg(feature = "plugins")]
        Modules,
        /// Run every enabled wasm module once.
        #[cfg(feature = "plugins")]
        Run,
        /// Drive one module interactively through its `draw`/`handle_key` exports.
        #[cfg(feature = "plugins")]
        Session {
            /// Module directory holding `module.toml`.
            module: PathBuf,
        },
    }

    pub fn main() -> Result<()> {
        let cli = Cli::parse();

        let config = match cli.config.as_deref() {
            Some(path) => HostConfig::load_from(path)?,
            None => HostConfig::load()?,
        };

        // stdout belongs to the guest; logs go elsewhere.
        let _guard = init_logging(&config.log.filter, cli.log_stderr)?;
        tracing::info!("mosaic starting");

        match cli.command.unwrap_or(Command::Guest) {
            Command::Guest => run_guest(&config),
            #[cfg(feature = "plugins")]
            Command::Modules => {
                let manager = crate::plugin::ModuleManager::new(&config);
                for row in manager.list_notifications() {
                    println!("{row}");
                }
                Ok(())
            }
            #[cfg(feature = "plugins")]
            Command::Run => {
                let mut manager = crate::plugin::ModuleManager::new(&config);
                tracing::info!(modules = manager.module_count(), "running wasm modules");
                for row in manager.run_all(&mut StdoutConsole) {
                    eprintln!("{row}");
                }
                Ok(())
            }
            #[cfg(feature = "plugins")]
            Command::Session { module } => session::run(&config, module),
        }
    }

    fn run_guest(config: &HostConfig) -> Result<()> {
        let host = &config.host;
        tracing::info!(
            root = %host.root_path().display(),
            readable = host.root_readable,
            "running built-in guest"
        );

        GuestEntry::new(StdoutConsole, host.magic(), host.sandbox()).run();
        Ok(())
    }

    #[cfg(feature = "plugins")]
    mod session {
        use std::io::{self, Write};
        use std::path::PathBuf;
        use std::process::{Command, Stdio};

        use anyhow::Result;
        use crossterm::event::{self, Event, KeyCode, KeyEventKind};
        use crossterm::terminal::{
            self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
            enable_raw_mode,
        };
        use crossterm::{cursor, execute};

        use crate::model::config::{HostConfig, HostSettings};
        use crate::plugin::key::KeyEvent;
        use crate::plugin::manifest::ModuleId;
        use crate::plugin::runtime::ModuleRuntime;
        use crate::plugin::session::ModuleSession;

        pub fn run(config: &HostConfig, module: PathBuf) -> Result<()> {
            let id = ModuleId::new(format!("path:{}", module.display()));
            let mut runtime = ModuleRuntime::discover(id, module);
            let mut session = runtime.session(&config.host)?;
            for line in session.take_output() {
                println!("{line}");
            }

            // Terminal setup
            enable_raw_mode()?;
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;

            let result = drive(&mut stdout, &mut session, &config.host);

            // Restore terminal
            disable_raw_mode()?;
            execute!(stdout, LeaveAlternateScreen, cursor::Show)?;

            result
        }

        fn drive(
            stdout: &mut io::Stdout,
            session: &mut ModuleSession,
            host: &HostSettings,
        ) -> Result<()> {
            loop {
                let (cols, rows) = terminal::size()?;
                let Some(frame) = session.draw(rows, cols)? else {
                    tracing::info!("module exports no draw; session over");
                    return Ok(());
                };

                execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
                write!(stdout, "{}", frame.join("\r\n"))?;
                stdout.flush()?;

                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.code == KeyCode::Char('q') {
                    return Ok(());
                }

                match KeyEvent::try_from(key) {
                    Ok(key) => {
                        session.handle_key(key)?;
                    }
                    Err(code) => tracing::debug!(?code, "key not forwarded"),
                }

                for path in session.take_open_requests() {
                    open(&host.opener, &path);
                }
            }
        }

        fn open(opener: &str, path: &std::path::Path) {
            let spawned = Command::new(opener)
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();

            if let Err(err) = spawned {
                tracing::warn!(opener, path = %path.display(), "failed to open file: {err}");
            }
        }
    }

    fn init_logging(default_filter: &str, stderr: bool) -> Result<Option<WorkerGuard>> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        if stderr {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
            return Ok(None);
        }

        let log_dir = directories::ProjectDirs::from("", "", "mosaic")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "mosaic.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(filter)
            .init();

        Ok(Some(guard))
    }
}
