use clap::{Parser, Subcommand};
use simple_blog::blog::Blog;
use simple_blog::output::{self, ArticleStatus, PageStatus};
use simple_blog::{config, logging, server};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simple-blog")]
#[command(about = "Markdown blog server with on-demand image thumbnails")]
#[command(long_about = "\
Markdown blog server with on-demand image thumbnails

Articles are markdown files with a JSON header. Images under the public
folder are served as cropped thumbnails at any size, rendered on first
request and cached on disk.

Site structure (paths configurable in config.toml):

  site/
  ├── config.toml                   # Optional, see 'gen-config'
  ├── resources/
  │   ├── articles/                 # One .md file per article, newest = highest name
  │   │   └── 2024-03-01-hello.md
  │   └── pages/                    # Markdown for custom pages ([[pages]] with a view)
  │       └── about.md
  ├── public/                       # Thumbnail sources: /image/300x200/img/cat.jpg
  │   └── img/cat.jpg
  └── storage/thumbs/               # Generated thumbnails (safe to delete)

Article file:

  {\"slug\": \"hello\", \"title\": \"Hello\", \"date\": \"2024-03-01\",
   \"description\": \"First post\", \"categories\": \"news\"}
  ::METAEND::
  Markdown body. [gallery folder=\"img/trip\"] expands to an image gallery.

Run 'simple-blog gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site root (the directory holding config.toml)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the blog over HTTP
    Serve,
    /// Validate config, routes and article headers without serving
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            logging::init(cli.verbose);
            let site_config = config::load_config(&cli.root)?;
            let blog = Blog::new(site_config, &cli.root)?;
            server::serve(blog)?;
        }
        Command::Check => {
            logging::init(cli.verbose);
            println!("==> Checking {}", cli.root.display());
            let site_config = config::load_config(&cli.root)?;
            let blog = Blog::new(site_config, &cli.root)?;

            let pages: Vec<PageStatus> = blog
                .config()
                .pages
                .iter()
                .filter_map(|page| {
                    let view_file = format!("{}.md", page.view.as_deref()?);
                    Some(PageStatus {
                        id: page.id.clone(),
                        exists: blog.templates_dir().join(&view_file).is_file(),
                        view_file,
                    })
                })
                .collect();

            let articles: Vec<ArticleStatus> = blog
                .articles()
                .filenames()?
                .into_iter()
                .map(|filename| ArticleStatus {
                    meta: blog.articles().read_meta(&filename),
                    filename,
                })
                .collect();

            output::print_check_output(blog.router().table().rules(), &pages, &articles);

            let problems = articles.iter().filter(|a| a.meta.is_err()).count()
                + pages.iter().filter(|p| !p.exists).count();
            if problems > 0 {
                return Err(format!("{problems} problem(s) found").into());
            }
            println!("==> Site is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
