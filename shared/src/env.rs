/// Loads variables from a `.env` file in the working directory, if any.
///
/// A missing file is not an error: every setting has a default or a CLI flag.
pub fn init() {
    if let Ok(path) = dotenv::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }
}
