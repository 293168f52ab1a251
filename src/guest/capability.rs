//! Host capabilities as seen from inside the guest.
//!
//! Each trait is one import. The guest never owns an implementation: the
//! harness hands them to [`GuestEntry`](super::GuestEntry) at construction
//! time, so a test can substitute a mock for the real runtime.

use super::listing::Listing;

/// Line-oriented standard output provided by the host.
///
/// Writing never fails from the guest's point of view. A host that cannot
/// write has to deal with that itself.
pub trait Console {
    fn log(&mut self, line: &str);
}

/// The host-defined `mosaic.magic_number` import.
pub trait MagicNumber {
    fn magic_number(&mut self) -> i32;
}

/// Directory enumeration over the guest's sandboxed filesystem.
pub trait DirectoryReader {
    /// Entry names of the directory at `path`, or [`Listing::Absent`] when the
    /// path is not exposed to the guest.
    fn read_dir(&mut self, path: &str) -> Listing;
}

impl<T: Console + ?Sized> Console for &mut T {
    fn log(&mut self, line: &str) {
        (**self).log(line);
    }
}

impl<T: MagicNumber + ?Sized> MagicNumber for &mut T {
    fn magic_number(&mut self) -> i32 {
        (**self).magic_number()
    }
}

impl<T: DirectoryReader + ?Sized> DirectoryReader for &mut T {
    fn read_dir(&mut self, path: &str) -> Listing {
        (**self).read_dir(path)
    }
}
