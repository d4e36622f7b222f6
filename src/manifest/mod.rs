//! Document manifest parsing and writing
//!
//! A manifest is a plain comma-separated text file. Each non-blank line
//! describes one document: the first field is the document's target name,
//! every following field is a page file ending in `.jpg` (still to be
//! converted) or `.tif` (already converted).
//!
//! ```text
//! doc1,page1.jpg,page2.jpg,page3.tif
//! doc2,scans/b1.jpg
//! ```
//!
//! Parsing keeps the exact text of every field so that writing the manifest
//! back only changes the extension of pages converted since the parse. Rows
//! without converted pages come out byte-identical.

pub mod error;

pub use error::{ManifestError, RowProblem};

use std::fmt;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tempfile::NamedTempFile;
use tracing::debug;

type Result<T> = std::result::Result<T, ManifestError>;

/// UTF-8 byte order mark, kept if the source starts with one
const BOM: char = '\u{feff}';

/// Page file extension. The extension is the only conversion status a page has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Color JPG, pending conversion
    Jpg,
    /// G4 TIFF, already converted
    Tif,
}

impl Extension {
    /// Lowercase extension text as written to the manifest
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Tif => "tif",
        }
    }

    /// Recognize an extension, ignoring ASCII case
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("jpg") {
            Some(Self::Jpg)
        } else if text.eq_ignore_ascii_case("tif") {
            Some(Self::Tif)
        } else {
            None
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line terminator used by the source file, reused on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    fn detect(text: &str) -> Self {
        if text.contains("\r\n") { Self::CrLf } else { Self::Lf }
    }
}

/// One page file reference inside a document row
#[derive(Debug, Clone)]
pub struct Page {
    /// Field text exactly as it appeared in the manifest
    raw: String,
    /// Byte range of the extension text within `raw`
    ext_span: Range<usize>,
    /// Trimmed base name (may contain directory components)
    name: String,
    parsed: Extension,
    extension: Extension,
}

impl Page {
    fn parse_field(raw: &str) -> std::result::Result<Self, RowProblem> {
        let unrecognized = || RowProblem::UnrecognizedExtension(raw.trim().to_string());

        let leading = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        let (stem, ext_text) = trimmed.rsplit_once('.').ok_or_else(unrecognized)?;
        if stem.is_empty() {
            return Err(unrecognized());
        }
        let extension = Extension::from_text(ext_text).ok_or_else(unrecognized)?;
        if stem.ends_with(['/', '\\']) {
            return Err(RowProblem::MissingFileName(trimmed.to_string()));
        }

        let ext_end = leading + trimmed.len();
        let ext_start = ext_end - ext_text.len();

        Ok(Self {
            raw: raw.to_string(),
            ext_span: ext_start..ext_end,
            name: stem.to_string(),
            parsed: extension,
            extension,
        })
    }

    /// Base name without extension, as written in the manifest
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current extension
    #[must_use]
    pub const fn extension(&self) -> Extension {
        self.extension
    }

    /// True while the page still needs conversion
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.extension == Extension::Jpg
    }

    /// True if the extension changed since the manifest was parsed
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.extension != self.parsed
    }

    /// File name with normalized extension, e.g. `page1.jpg`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    /// Extension text as written in the manifest, e.g. `JPG`
    #[must_use]
    pub fn written_extension(&self) -> &str {
        &self.raw[self.ext_span.clone()]
    }

    /// Resolve the page against `base_dir` using the given extension.
    ///
    /// The parsed extension keeps its written case, so `A.JPG` resolves to
    /// `A.JPG` on disk. Any other extension is spelled lowercase, matching what
    /// a conversion writes. Absolute page names are returned unchanged.
    #[must_use]
    pub fn path_with(&self, base_dir: &Path, extension: Extension) -> PathBuf {
        let ext = if extension == self.parsed {
            self.written_extension()
        } else {
            extension.as_str()
        };
        let file = PathBuf::from(format!("{}.{ext}", self.name));
        if file.is_absolute() {
            file
        } else {
            base_dir.join(file)
        }
    }

    /// Resolve the page's current file against `base_dir`
    #[must_use]
    pub fn path(&self, base_dir: &Path) -> PathBuf {
        self.path_with(base_dir, self.extension)
    }

    /// Record a successful conversion
    pub const fn mark_converted(&mut self) {
        self.extension = Extension::Tif;
    }

    /// Field text to write back
    fn to_field(&self) -> String {
        if self.is_modified() {
            format!(
                "{}{}{}",
                &self.raw[..self.ext_span.start],
                self.extension.as_str(),
                &self.raw[self.ext_span.end..]
            )
        } else {
            self.raw.clone()
        }
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.extension == other.extension
    }
}

impl Eq for Page {}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.extension)
    }
}

/// One manifest row: a target name and its ordered pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    target: String,
    pages: Vec<Page>,
}

impl Document {
    /// Target name exactly as written. Not interpreted, only preserved.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Pages in row order
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// True if any page was converted since parse
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.pages.iter().any(Page::is_modified)
    }
}

/// Parsed manifest: the ordered documents of one manifest file
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    documents: Vec<Document>,
    line_ending: LineEnding,
    /// Source started with a UTF-8 byte order mark
    bom: bool,
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.documents == other.documents
    }
}

impl Eq for Manifest {}

impl Manifest {
    /// Parse manifest text.
    ///
    /// Blank lines are skipped. Page extensions are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MalformedRow`] for the first row with an empty
    /// target name, no page fields, or a page without a `jpg`/`tif` extension.
    /// Nothing is returned on error, so a bad row can never silently drop pages.
    pub fn parse(text: &str) -> Result<Self> {
        let (bom, body) = match text.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        // One reader per line keeps line numbers exact across skipped blank lines
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::None);

        let mut documents = Vec::new();
        let mut record = csv::StringRecord::new();
        for (line, source) in (1u64..).zip(body.lines()) {
            if source.trim().is_empty() {
                continue;
            }
            builder.from_reader(source.as_bytes()).read_record(&mut record)?;

            let malformed = |problem| ManifestError::MalformedRow { line, problem };

            let mut fields = record.iter();
            let target = fields.next().unwrap_or_default();
            if target.trim().is_empty() {
                return Err(malformed(RowProblem::MissingTarget));
            }

            let pages = fields
                .map(Page::parse_field)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(malformed)?;
            if pages.is_empty() {
                return Err(malformed(RowProblem::NoPages));
            }

            documents.push(Document {
                target: target.to_string(),
                pages,
            });
        }

        Ok(Self {
            documents,
            line_ending: LineEnding::detect(body),
            bom,
        })
    }

    /// Write the manifest back to text.
    ///
    /// Rows and fields come out in parse order. Only converted pages differ from
    /// the source text, and their new extension is written as lowercase `tif`.
    #[must_use]
    pub fn serialize(&self) -> String {
        let terminator = self.line_ending.as_str();
        let mut out = String::new();
        if self.bom {
            out.push(BOM);
        }
        for doc in &self.documents {
            out.push_str(&doc.target);
            for page in &doc.pages {
                out.push(',');
                out.push_str(&page.to_field());
            }
            out.push_str(terminator);
        }
        out
    }

    /// Read and parse a manifest file
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Io` if the file cannot be read, or any parse error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let manifest = Self::parse(&text)?;
        debug!(
            path = %path.display(),
            documents = manifest.documents.len(),
            pending = manifest.pending_count(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Write the manifest to `path`, replacing the file atomically.
    ///
    /// The text goes to a temporary file in the same directory which is then
    /// renamed over the target, so a failed write never truncates the manifest.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Io` if the temporary file cannot be written or
    /// moved into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(self.serialize().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "saved manifest");
        Ok(())
    }

    /// Documents in file order
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Page at (`document`, `row`)
    #[must_use]
    pub fn page(&self, document: usize, row: usize) -> Option<&Page> {
        self.documents.get(document)?.pages.get(row)
    }

    /// Mutable page at (`document`, `row`). Documents and pages cannot be
    /// reordered through this handle.
    pub fn page_mut(&mut self, document: usize, row: usize) -> Option<&mut Page> {
        self.documents.get_mut(document)?.pages.get_mut(row)
    }

    /// Mutable pages in document then row order
    pub fn pages_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.documents.iter_mut().flat_map(|d| d.pages.iter_mut())
    }

    /// Total number of page references
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.documents.iter().map(|d| d.pages.len()).sum()
    }

    /// Number of pages still needing conversion
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|d| &d.pages)
            .filter(|p| p.is_pending())
            .count()
    }

    /// True if any page was converted since parse
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.documents.iter().any(Document::is_modified)
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
