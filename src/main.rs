use clap::{Args, Parser, Subcommand};
use shutter_admin::admin::ImageManager;
use shutter_admin::gallery::{Category, CategoryFilter, Gallery, GalleryStore, ImageId};
use shutter_admin::render::{SiteRenderer, home_page, render_html};
use shutter_admin::settings::SettingsStore;
use shutter_admin::storage::FileStore;
use shutter_admin::sync::{Broadcaster, Browser, Tab};
use shutter_admin::types::Confirm;
use shutter_admin::upload::{self, FileInput};
use shutter_admin::{config, export, output};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shutter-admin")]
#[command(about = "Manage the imagery of a photography website")]
#[command(long_about = "\
Manage the imagery of a photography website

Site images (one profile photo, an optional logo, four portfolio slots) and
the bulk-upload gallery live in a data directory as JSON records. Every change
is saved there and picked up by the site's pages.

Typical session:

  shutter-admin upload shoots/2024-06-wedding --dir shoots/extra
  shutter-admin gallery --category all
  shutter-admin categorize 1718000000000-9f2c41d0 wedding
  shutter-admin assign-portfolio 1718000000000-9f2c41d0 1718000000001-0b7e22aa
  shutter-admin set-logo https://example.com/logo.svg
  shutter-admin preview --out index.html

Run 'shutter-admin gen-config' to generate a documented shutter-admin.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = "shutter-admin.toml", global = true)]
    config: PathBuf,

    /// Data directory, overriding [storage] data_dir
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Answer yes to every confirmation prompt
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

/// Selection flags for batch gallery commands.
#[derive(Args, Clone)]
struct SelectArgs {
    /// Gallery image ids, in selection order
    ids: Vec<ImageId>,

    /// Select every image visible under --category
    #[arg(long)]
    all: bool,

    /// Category filter for --all (wedding, portrait, event, other, all)
    #[arg(long, default_value = "all")]
    category: CategoryFilter,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current site images
    Show,
    /// Set the profile photo from a URL
    SetProfile { url: String },
    /// Set the logo from a URL
    SetLogo { url: String },
    /// Set portfolio slot 1-4 from a URL
    SetPortfolio { slot: usize, url: String },
    /// Upload a file as the profile photo
    UploadProfile { file: PathBuf },
    /// Upload a file as the logo
    UploadLogo { file: PathBuf },
    /// Upload image files into the gallery
    Upload {
        files: Vec<PathBuf>,
        /// Also upload every file below this directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List gallery images
    Gallery {
        #[arg(long, default_value = "all")]
        category: CategoryFilter,
    },
    /// Change a gallery image's category
    Categorize { id: ImageId, category: Category },
    /// Use a gallery image as the profile photo
    UseAsProfile { id: ImageId },
    /// Put a gallery image into the first unfilled portfolio slot
    AddToPortfolio { id: ImageId },
    /// Fill portfolio slots 1.. with the selected gallery images
    AssignPortfolio(SelectArgs),
    /// Delete gallery images
    Delete(SelectArgs),
    /// Save the current settings again, announcing them to open pages
    Save,
    /// Reset all site images to the defaults
    Reset,
    /// Write the settings export
    ExportSettings {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write the gallery export (gallery plus settings)
    ExportGallery {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Render the home page with the current images
    Preview {
        /// Output file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a stock shutter-admin.toml with all options documented
    GenConfig,
}

/// Confirmation on the terminal, or unconditional with `--yes`.
struct TerminalConfirm {
    assume_yes: bool,
}

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"),
            Err(_) => false,
        }
    }
}

/// Everything a command may need, opened against the configured data directory.
struct Session {
    config: config::AdminConfig,
    tab: Tab,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config::load_config(&cli.config)?;
        let data_dir = cli
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.storage.data_dir));
        let durable = Arc::new(FileStore::open(data_dir)?);
        let tab = Browser::new(durable).open_tab();
        Ok(Self { config, tab })
    }

    fn settings_store(&self) -> SettingsStore {
        SettingsStore::new(
            self.tab.durable(),
            &self.config.storage.settings_key,
            self.config.defaults.settings(),
        )
    }

    fn manager(&self) -> Result<ImageManager, Box<dyn std::error::Error>> {
        let broadcaster = Broadcaster::new(
            self.settings_store(),
            &self.tab,
            &self.config.storage.session_key,
        );
        Ok(ImageManager::new(broadcaster, &self.config.defaults)?)
    }

    fn gallery(&self) -> Result<Gallery, Box<dyn std::error::Error>> {
        let store = GalleryStore::new(self.tab.durable(), &self.config.storage.gallery_key);
        Ok(Gallery::load(store)?)
    }
}

/// Apply `--all`/ids to the gallery selection.
fn select(gallery: &mut Gallery, args: &SelectArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.all {
        gallery.select_all(args.category);
    }
    for id in &args.ids {
        gallery.select(id)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut confirm = TerminalConfirm {
        assume_yes: cli.yes,
    };

    // Needs no data directory.
    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let session = Session::open(&cli)?;

    match &cli.command {
        Command::Show => {
            output::print_settings(session.manager()?.settings());
        }
        Command::SetProfile { url } => {
            output::print_notice(&session.manager()?.update_profile_photo(url)?);
        }
        Command::SetLogo { url } => {
            output::print_notice(&session.manager()?.update_logo(url)?);
        }
        Command::SetPortfolio { slot, url } => {
            output::print_notice(&session.manager()?.update_portfolio_image(*slot, url)?);
        }
        Command::UploadProfile { file } => {
            let file = FileInput::from_path(file)?;
            output::print_notice(&session.manager()?.upload_profile_file(&file)?);
        }
        Command::UploadLogo { file } => {
            let file = FileInput::from_path(file)?;
            output::print_notice(&session.manager()?.upload_logo_file(&file)?);
        }
        Command::Upload { files, dir } => {
            let mut inputs = files
                .iter()
                .map(FileInput::from_path)
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(dir) = dir {
                inputs.extend(upload::collect_dir(dir)?);
            }
            let mut gallery = session.gallery()?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_upload_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = upload::ingest(inputs, Some(tx));
            printer
                .join()
                .map_err(|_| "upload progress printer panicked")?;

            gallery.add_uploaded(result?)?;
            println!("{}", output::format_stats(gallery.stats()));
        }
        Command::Gallery { category } => {
            let gallery = session.gallery()?;
            output::print_gallery(
                &gallery.visible(*category),
                gallery.selection(),
                gallery.stats(),
            );
        }
        Command::Categorize { id, category } => {
            session.gallery()?.set_category(id, *category)?;
            println!("{} → {}", id, category);
        }
        Command::UseAsProfile { id } => {
            let gallery = session.gallery()?;
            output::print_notice(&session.manager()?.use_as_profile(&gallery, id)?);
        }
        Command::AddToPortfolio { id } => {
            let gallery = session.gallery()?;
            output::print_notice(&session.manager()?.add_to_portfolio(&gallery, id)?);
        }
        Command::AssignPortfolio(args) => {
            let mut gallery = session.gallery()?;
            select(&mut gallery, args)?;
            let notice = session.manager()?.add_selected_to_portfolio(&mut gallery)?;
            output::print_notice(&notice);
        }
        Command::Delete(args) => {
            let mut gallery = session.gallery()?;
            let outcome = match (args.all, args.ids.as_slice()) {
                (false, [id]) => gallery.delete(id, &mut confirm)?,
                _ => {
                    select(&mut gallery, args)?;
                    gallery.delete_selected(&mut confirm)?
                }
            };
            output::print_outcome(&outcome);
        }
        Command::Save => {
            output::print_notice(&session.manager()?.save_all()?);
        }
        Command::Reset => {
            let outcome = session.manager()?.reset_to_defaults(&mut confirm)?;
            output::print_outcome(&outcome);
        }
        Command::ExportSettings { out } => {
            let settings = session.settings_store().load()?;
            let path = export::export_settings(&settings, out, &session.config.export)?;
            println!("Exported settings → {}", path.display());
        }
        Command::ExportGallery { out } => {
            let gallery = session.gallery()?;
            let settings = session.settings_store().load()?;
            let path = export::export_gallery(
                gallery.images(),
                &settings,
                chrono::Utc::now(),
                out,
                &session.config.export,
            )?;
            println!("Exported gallery → {}", path.display());
        }
        Command::Preview { out } => {
            let settings = session.settings_store().load()?;
            let mut page = home_page(&session.config.markers, &session.config.defaults);
            let report = SiteRenderer::new(session.config.markers.clone()).apply(&mut page, &settings);
            let html = render_html(&page).into_string();
            match out {
                Some(path) => {
                    std::fs::write(path, html)?;
                    println!("{}", output::format_apply_report(&report));
                    println!("Wrote preview → {}", path.display());
                }
                None => println!("{}", html),
            }
        }
        Command::GenConfig => {}
    }

    Ok(())
}
