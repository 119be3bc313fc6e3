//! Repository name guesses for a dependency.
//!
//! Package names rarely map to repositories by rule, so a few cheap guesses are
//! tried in order:
//!
//! 1. `name/name`
//! 2. `<namespace>/name` for each configured organizational namespace
//! 3. `under_scored/under_scored` with `-` replaced by `_`
//!
//! Repeated guesses are dropped, keeping the first occurrence.

/// Ordered, de-duplicated `owner/repo` candidates for `dependency`.
///
/// ## Examples
///
/// ```
/// use lockstep_lib::changelog::candidates::candidate_repositories;
///
/// let namespaces = vec!["rails".to_string()];
/// assert_eq!(
///     candidate_repositories("rack-session", &namespaces),
///     vec!["rack-session/rack-session", "rails/rack-session", "rack_session/rack_session"]
/// );
/// ```
pub fn candidate_repositories(dependency: &str, namespaces: &[String]) -> Vec<String> {
    let normalized = dependency.replace('-', "_");

    let guesses = std::iter::once(format!("{dependency}/{dependency}"))
        .chain(namespaces.iter().map(|ns| format!("{ns}/{dependency}")))
        .chain(std::iter::once(format!("{normalized}/{normalized}")));

    let mut candidates: Vec<String> = Vec::new();
    for guess in guesses {
        if !candidates.contains(&guess) {
            candidates.push(guess);
        }
    }
    candidates
}
