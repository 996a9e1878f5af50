//! signd - live traffic sign classifier
//!
//! This binary:
//! 1. Loads the label vocabulary and checks it against the sign catalog
//! 2. Loads the classifier (analysis stays off if that fails)
//! 3. Waits for camera access, then captures and classifies frames in the
//!    background
//! 4. Redraws the recognised sign once a second
//!
//! Keys: `t` torch, `s` camera access help, `q`/Esc quit.

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sign_classifier::app::{build_pipeline, load_classifier};
use sign_classifier::config::SigndConfig;
use sign_classifier::presenter::{TerminalView, FLASH_UNAVAILABLE};
use sign_classifier::ui::{self, Ui};
use sign_classifier::{labels, open_source, SignApp, SignCatalog, TorchOutcome};

const TICK: Duration = Duration::from_millis(100);
const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

const SETTINGS_GUIDANCE: &str = "Izin kamera: tambahkan pengguna ke grup 'video' \
(sudo usermod -aG video $USER), masuk ulang, lalu jalankan kembali aplikasi ini.";
const TORCH_FAILED: &str = "Flash tidak dapat diubah.";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "SIGN_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source: stub://<name>, /dev/videoN, or an image file/directory.
    #[arg(long)]
    source: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum Control {
    Continue,
    Quit,
}

/// Restores cooked mode however the loop exits.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    init_logging(interactive);

    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), !interactive);

    let mut cfg = SigndConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source.as_deref() {
        cfg.override_source(source)?;
    }

    let catalog = Arc::new(SignCatalog::builtin());
    let vocabulary = {
        let stage = ui.stage("Load labels");
        let vocabulary = labels::load_checked(&cfg.labels_path, &catalog)?;
        stage.finish(Some(&format!("{} classes", vocabulary.len())));
        Arc::new(vocabulary)
    };

    let pipeline = {
        let stage = ui.stage("Load classifier");
        match load_classifier(&cfg, &vocabulary) {
            Ok(classifier) => {
                let name = classifier.name();
                let pipeline = build_pipeline(&cfg, classifier, Arc::clone(&vocabulary))?;
                stage.finish(Some(name));
                Some(pipeline)
            }
            Err(err) => {
                drop(stage);
                log::error!("classifier unavailable, analysis disabled: {:#}", err);
                None
            }
        }
    };

    let mut app = {
        let stage = ui.stage("Open camera");
        let source = open_source(cfg.source.clone())?;
        let mut app = SignApp::new(source, pipeline, catalog, cfg.classifier.threshold);
        app.sync_permission()?;
        stage.finish(Some(&format!("{} ({:?})", cfg.source.url, app.permission())));
        app
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .map_err(|err| anyhow::anyhow!("failed to install Ctrl-C handler: {}", err))?;
    }

    log::info!(
        "signd running (source {}, threshold {})",
        cfg.source.url,
        cfg.classifier.threshold
    );
    let result = run_loop(&mut app, &cfg, interactive, &stop);
    app.shutdown()?;
    log::info!("signd stopped");
    result
}

fn init_logging(interactive: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if interactive {
        // Raw mode does not translate \n into \r\n.
        builder.format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}\r",
                record.level(),
                record.target(),
                record.args()
            )
        });
    }
    builder.init();
}

fn run_loop(
    app: &mut SignApp,
    cfg: &SigndConfig,
    interactive: bool,
    stop: &AtomicBool,
) -> Result<()> {
    let _raw_mode = if interactive {
        Some(RawModeGuard::enable()?)
    } else {
        None
    };
    let mut view = TerminalView::new(interactive);
    let mut stdout = std::io::stdout();

    view.show(&mut stdout, app.refresh())?;
    let mut last_permission_check = Instant::now();
    let mut last_refresh = Instant::now();
    let mut last_health_log = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        if interactive {
            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        let quit_chord = key.modifiers.contains(KeyModifiers::CONTROL)
                            && key.code == KeyCode::Char('c');
                        if quit_chord {
                            break;
                        }
                        if let Control::Quit = handle_key(key.code, app, &mut view)? {
                            break;
                        }
                    }
                }
            }
        } else {
            std::thread::sleep(TICK);
        }

        if last_permission_check.elapsed() >= cfg.presenter.permission_recheck {
            app.sync_permission()?;
            last_permission_check = Instant::now();
        }

        if last_refresh.elapsed() >= cfg.presenter.refresh {
            view.show(&mut stdout, app.refresh())?;
            last_refresh = Instant::now();
        }

        if last_health_log.elapsed() >= HEALTH_INTERVAL {
            if let Some(stats) = app.stats() {
                log::info!("{}", ui::health_line(&stats));
            }
            last_health_log = Instant::now();
        }
    }
    Ok(())
}

fn handle_key(code: KeyCode, app: &mut SignApp, view: &mut TerminalView) -> Result<Control> {
    let mut stdout = std::io::stdout();
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(Control::Quit),
        KeyCode::Char('t') => match app.toggle_torch() {
            TorchOutcome::On => log::info!("torch on"),
            TorchOutcome::Off => log::info!("torch off"),
            TorchOutcome::Unavailable => view.notice(&mut stdout, FLASH_UNAVAILABLE)?,
            TorchOutcome::Failed => view.notice(&mut stdout, TORCH_FAILED)?,
        },
        KeyCode::Char('s') => view.notice(&mut stdout, SETTINGS_GUIDANCE)?,
        _ => {}
    }
    Ok(Control::Continue)
}
