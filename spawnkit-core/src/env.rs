use std::collections::HashMap;
use tracing::warn;

/// Copies the current process environment and applies `overrides` in order,
/// so a later override of the same name wins.
///
/// The real process environment is never modified. Variables whose name or
/// value is not valid Unicode are left out of the copy, and therefore out of
/// the environment of any child launched with the result.
pub fn env_with_overrides<I, K, V>(overrides: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut env: HashMap<String, String> = std::env::vars_os()
        .filter_map(|(name, value)| match (name.to_str(), value.to_str()) {
            (Some(name), Some(value)) => Some((name.to_owned(), value.to_owned())),
            _ => {
                warn!(
                    variable = %name.to_string_lossy(),
                    "Skipping environment variable that is not valid Unicode"
                );
                None
            }
        })
        .collect();

    for (name, value) in overrides {
        env.insert(name.into(), value.into());
    }

    env
}
