use comic_page::model::is_page_path;
use comic_page::render::{install_font, OutlineFont};
use comic_page::{Catalog, DirectoryGroup, ObjectContext, Page, ReaderConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Result of a thumbnail run
#[derive(Debug, Clone, Default, PartialEq)]
struct ImportResult {
    pages: usize,
    thumbnails_built: usize,
    unavailable: usize,
    spreads: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: comic-page <folder or page file>...");
        return ExitCode::from(2);
    }

    match run(paths) {
        Ok(result) => {
            log::info!(
                "✅ Done: {} pages, {} thumbnails built, {} unavailable, {} spreads",
                result.pages,
                result.thumbnails_built,
                result.unavailable,
                result.spreads
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Register every path as a group or loose page, then build thumbnails
fn run(paths: Vec<PathBuf>) -> Result<ImportResult, Box<dyn std::error::Error>> {
    let config = ReaderConfig::load()?;
    if let Some(path) = &config.text_font_path {
        match OutlineFont::load(path) {
            Ok(font) => install_font(font),
            Err(e) => log::warn!("⚠️  Using the built-in text font: {}", e),
        }
    }

    let catalog = Catalog::open(&config.database_path)?;
    let ctx = Arc::new(ObjectContext::new(catalog));
    let session = ctx.create_session()?;

    let mut pages = Vec::new();
    for path in &paths {
        if path.is_dir() {
            let group = DirectoryGroup::scan(path);
            let (_, group_pages) = ctx.add_group_pages(session, &path.to_string_lossy(), Arc::new(group))?;
            pages.extend(group_pages);
        } else if is_page_path(path) {
            pages.push(ctx.add_loose_file(session, path)?);
        } else {
            log::warn!("⚠️  Skipping {}: not an image or text file", path.display());
        }
    }

    // Thumbnails are CPU-bound; the blocking pool does the work
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let result = runtime.block_on(build_thumbnails(ctx.clone(), pages, config.thumbnail_workers));

    ctx.save()?;
    Ok(result)
}

/// Tracks the last hundred reported, since a batch can step past a multiple
#[derive(Debug, Default)]
struct Progress {
    last_hundred: usize,
}

impl Progress {
    /// Whether `built` reached a hundred not reported yet
    fn crossed_hundred(&mut self, built: usize) -> bool {
        let hundred = built / 100;
        if hundred > self.last_hundred {
            self.last_hundred = hundred;
            return true;
        }
        false
    }
}

/// Build missing thumbnails, at most `workers` at a time
async fn build_thumbnails(ctx: Arc<ObjectContext>, pages: Vec<Arc<Page>>, workers: usize) -> ImportResult {
    let mut result = ImportResult {
        pages: pages.len(),
        ..ImportResult::default()
    };

    let mut progress = Progress::default();

    for batch in pages.chunks(workers.max(1)) {
        let tasks: Vec<_> = batch
            .iter()
            .cloned()
            .map(|page| {
                let ctx = ctx.clone();
                tokio::task::spawn_blocking(move || {
                    let built = page.prep_thumbnail(ctx.as_ref()).is_some();
                    let spread = built && !page.is_text() && page.should_display_alone(ctx.as_ref());
                    (built, spread)
                })
            })
            .collect();

        for task in tasks {
            match task.await {
                Ok((true, spread)) => {
                    result.thumbnails_built += 1;
                    if spread {
                        result.spreads += 1;
                    }
                }
                Ok((false, _)) => result.unavailable += 1,
                Err(e) => log::warn!("⚠️  Thumbnail task failed: {}", e),
            }
        }

        if progress.crossed_hundred(result.thumbnails_built) {
            log::info!("⏳ Built {} thumbnails...", result.thumbnails_built);
        }
    }

    result
}
