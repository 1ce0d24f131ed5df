//! Lazily initialized values for `static` items.
//!
//! [`Lazy`] replaces the "check a flag, build the value, set the flag"
//! pattern around mutable statics. The initializer runs on first access,
//! exactly once, through a [`OnceInitializer`].

use std::fmt;
use std::ops::Deref;

use parking_lot::{const_mutex, Mutex};

use super::once::OnceInitializer;

/// A value initialized on first access.
///
/// If the initializer panics, the panic propagates to that caller and every
/// later access panics as well, since the initializer has been consumed.
///
/// # Example
///
/// ```ignore
/// static ROUTES: Lazy<HashMap<&str, Handler>> = Lazy::new(build_routes);
///
/// let handler = ROUTES.get("/health");
/// ```
pub struct Lazy<T, F = fn() -> T> {
    cell: OnceInitializer<T>,
    init: Mutex<Option<F>>,
}

impl<T, F> Lazy<T, F> {
    /// Creates a lazy value that will be built by `init`.
    #[must_use]
    pub const fn new(init: F) -> Self {
        Self {
            cell: OnceInitializer::new(),
            init: const_mutex(Some(init)),
        }
    }

    /// Returns the value if it has already been built.
    #[must_use]
    pub fn get(this: &Self) -> Option<&T> {
        this.cell.get()
    }
}

impl<T, F: FnOnce() -> T> Lazy<T, F> {
    /// Builds the value if needed and returns it.
    pub fn force(this: &Self) -> &T {
        this.cell.get_or_init(|| {
            // Only reached under the initializer's lock, so this never contends.
            let init = this.init.lock().take();
            match init {
                Some(init) => init(),
                None => panic!("Lazy instance previously panicked during initialization"),
            }
        })
    }
}

impl<T, F: FnOnce() -> T> Deref for Lazy<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        Self::force(self)
    }
}

impl<T: Default> Default for Lazy<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Lazy<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_tuple("Lazy");
        match Self::get(self) {
            Some(v) => d.field(v),
            None => d.field(&format_args!("<uninit>")),
        };
        d.finish()
    }
}
