use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "lazyzip")]
#[command(version)]
#[command(about = "Read single files out of remote ZIP/EPUB archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  lazyzip -l https://example.com/archive.zip          list entries\n  \
  lazyzip https://example.com/book.epub mimetype      extract one entry\n  \
  lazyzip -p https://example.com/a.zip notes.txt | less   pipe entry to stdout")]
pub struct Cli {
    /// Archive HTTP(S) URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Entries to extract (default: all files)
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List entries verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract entries to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract entries into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Persist fetched byte ranges under this directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<String>,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }
}
