use super::capability::{Console, DirectoryReader, MagicNumber};

pub const GREETING: &str = "Hello from Rust! Look at this cool multi-language support!";
pub const MAGIC_LABEL: &str = "The magic was: ";
pub const DIRECTORY_FALLBACK: &str = "Couldn't read the current directory!";
pub const LISTING_ROOT: &str = "/";

/// Import module and function name the host binds the numeric capability to.
pub const IMPORT_MODULE: &str = "mosaic";
pub const IMPORT_FUNCTION: &str = "magic_number";

/// The guest's start routine, with its host capabilities injected.
pub struct GuestEntry<C, N, D> {
    console: C,
    numeric: N,
    fs: D,
}

impl<C, N, D> GuestEntry<C, N, D>
where
    C: Console,
    N: MagicNumber,
    D: DirectoryReader,
{
    pub fn new(console: C, numeric: N, fs: D) -> Self {
        Self {
            console,
            numeric,
            fs,
        }
    }

    /// Greeting, magic number, root listing. One call each, in that order.
    pub fn run(&mut self) {
        tracing::debug!("guest entry starting");

        self.console.log(GREETING);

        let magic = self.numeric.magic_number();
        self.console.log(&format!("{MAGIC_LABEL}{magic}"));

        let listing = self.fs.read_dir(LISTING_ROOT);
        if listing.is_absent() {
            tracing::debug!(path = LISTING_ROOT, "directory capability absent");
            self.console.log(DIRECTORY_FALLBACK);
        } else {
            self.console.log(&listing.to_string());
        }

        tracing::debug!("guest entry finished");
    }

    pub fn into_parts(self) -> (C, N, D) {
        (self.console, self.numeric, self.fs)
    }
}
