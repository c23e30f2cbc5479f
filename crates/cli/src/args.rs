use clap::{Parser, Subcommand, ValueEnum};
use gallery_core::tags::TagFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gallery")]
#[command(about = "Self-hosted media gallery: browse, tag, clip and tidy a media tree", long_about = None)]
pub struct Cli {
    /// Project root holding config.json
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Print results as pretty JSON
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List a directory below the media root
    Browse {
        #[arg(default_value = "")]
        subpath: String,
    },
    /// Visible media from the whole tree
    AllMedia {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Visible videos from the whole tree
    AllVideos {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Match media names against keywords
    Search {
        #[arg(num_args = 0..)]
        keywords: Vec<String>,
    },
    /// Sorted tag listing
    Tags,
    /// Add tags to media (URLs or basenames)
    Tag {
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        tags: Vec<String>,
        #[arg(required = true)]
        media: Vec<String>,
    },
    /// Every displayable tag with whether `media` carries it
    TagsOf { media: String },
    /// Media carrying all (and) or any (or) of the tags
    Filter {
        #[arg(long, value_enum, default_value = "or")]
        op: FilterOp,
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        tags: Vec<String>,
    },
    /// Toggle hidden status of tags
    Hide {
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        tags: Vec<String>,
    },
    /// Rename one media file
    Rename { url: String, new_name: String },
    /// Rename several items; `#` in the pattern stands for the old name
    RenameMultiple {
        /// Items are tag names to merge into NAME
        #[arg(long, default_value_t = false)]
        tags: bool,
        #[arg(long)]
        name: String,
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Move to the recycle bin, or remove for good when already there
    Delete { url: String },
    DeleteMultiple {
        /// Items are tag names to remove
        #[arg(long, default_value_t = false)]
        tags: bool,
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Move items to a directory below the media root
    Move {
        #[arg(long)]
        to: String,
        #[arg(required = true)]
        items: Vec<String>,
    },
    #[command(subcommand)]
    Clips(ClipCommands),
}

#[derive(Subcommand, Debug)]
pub enum ClipCommands {
    /// Clips marked on a video URL
    Get { url: String },
    /// Replace the clips of a video URL; each range is START-STOP in seconds
    Set {
        url: String,
        #[arg(num_args = 0..)]
        ranges: Vec<String>,
    },
    /// Every video with marked clips
    List,
    /// Cut the marked clips out with ffmpeg
    Render {
        url: String,
        #[arg(long, default_value_t = 1)]
        resolution: u32,
        #[arg(long, default_value_t = false)]
        preview: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    And,
    Or,
}

impl From<FilterOp> for TagFilter {
    fn from(op: FilterOp) -> Self {
        match op {
            FilterOp::And => TagFilter::And,
            FilterOp::Or => TagFilter::Or,
        }
    }
}
