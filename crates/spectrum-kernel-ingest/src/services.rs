use spectrum_kernel_core::{KernelError, ServiceAllocation, Tier};

/// A radiocommunication service as named in the allocation tables.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KnownService {
    /// Canonical label stored on parsed allocations.
    pub name: &'static str,
    /// Spellings seen in extracted text, such as hyphenation at line breaks.
    pub aliases: &'static [&'static str],
}

const fn service(name: &'static str) -> KnownService {
    KnownService { name, aliases: &[] }
}

pub const KNOWN_SERVICES: &[KnownService] = &[
    service("Aeronautical Mobile"),
    service("Aeronautical Mobile-Satellite"),
    KnownService {
        name: "Aeronautical Radionavigation",
        aliases: &["Aeronautical Radionavi-gation"],
    },
    service("Amateur"),
    service("Amateur-Satellite"),
    service("Broadcasting"),
    service("Broadcasting-Satellite"),
    service("Earth Exploration-Satellite"),
    service("Fixed"),
    service("Fixed-Satellite"),
    service("Inter-Satellite"),
    service("Land Mobile"),
    service("Maritime Mobile"),
    service("Maritime Mobile-Satellite"),
    service("Maritime Radionavigation"),
    service("Meteorological Aids"),
    service("Meteorological-Satellite"),
    service("Mobile except aeronautical mobile"),
    service("Mobile"),
    service("Mobile-Satellite except aeronautical mobile-satellite"),
    service("Mobile-Satellite except maritime mobile-satellite"),
    service("Mobile-Satellite"),
    service("Radio Astronomy"),
    KnownService {
        name: "Radiodetermination-Satellite",
        aliases: &["Radiodetermination-Satel-lite"],
    },
    service("Radiolocation"),
    service("Radiolocation-Satellite"),
    service("Radionavigation"),
    service("Radionavigation-Satellite"),
    service("Space Operation"),
    service("Space Research"),
    service("Standard Frequency and Time Signal"),
    service("Standard Frequency and Time Signal-Satellite"),
];

/// Longest known spelling that prefixes `text` on a word boundary, with the
/// matched slice of `text`.
fn match_service(text: &str) -> Option<(&'static KnownService, &str)> {
    let mut best: Option<(&'static KnownService, usize)> = None;
    for known in KNOWN_SERVICES {
        for spelling in std::iter::once(&known.name).chain(known.aliases.iter()) {
            let Some(prefix) = text.get(..spelling.len()) else {
                continue;
            };
            if !prefix.eq_ignore_ascii_case(spelling) {
                continue;
            }
            let rest = &text[spelling.len()..];
            let on_boundary =
                rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with('(');
            if on_boundary && best.map_or(true, |(_, length)| spelling.len() > length) {
                best = Some((known, spelling.len()));
            }
        }
    }
    best.map(|(known, length)| (known, &text[..length]))
}

/// The service an allocation line names, if any.
#[must_use]
pub fn identify_service(text: &str) -> Option<&'static KnownService> {
    match_service(text.trim()).map(|(known, _)| known)
}

fn is_upper_case_word(word: &str) -> bool {
    word.chars().any(char::is_alphabetic) && !word.chars().any(char::is_lowercase)
}

/// Parse one allocation line such as `FIXED-SATELLITE (space-to-Earth) 5.441`.
///
/// The service is primary when the first word of its name is written in
/// upper case, secondary otherwise. Parenthesized groups directly after the
/// name are modifiers and the remaining words are footnote identifiers.
///
/// # Errors
/// Returns [`KernelError::InvalidRecord`] for unknown services and unclosed
/// modifiers.
pub fn parse_allocation(text: &str) -> Result<ServiceAllocation, KernelError> {
    let text = text.trim();
    let Some((known, invocation)) = match_service(text) else {
        return Err(KernelError::InvalidRecord(format!("no known service in `{text}`")));
    };
    let primary = invocation.split_whitespace().next().is_some_and(is_upper_case_word);
    let tier = if primary { Tier::Primary } else { Tier::Secondary };
    let mut allocation = ServiceAllocation::new(known.name, tier);

    let mut rest = text[invocation.len()..].trim_start();
    while let Some(inner) = rest.strip_prefix('(') {
        let Some(close) = inner.find(')') else {
            return Err(KernelError::InvalidRecord(format!("unclosed modifier in `{text}`")));
        };
        allocation = allocation.with_modifier(inner[..close].trim());
        rest = inner[close + 1..].trim_start();
    }
    for footnote in rest.split_whitespace() {
        allocation = allocation.with_footnote(footnote);
    }
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ServiceAllocation {
        match parse_allocation(text) {
            Ok(allocation) => allocation,
            Err(err) => panic!("`{text}` should parse: {err}"),
        }
    }

    #[test]
    fn longest_service_name_wins() {
        assert_eq!(
            identify_service("FIXED-SATELLITE (Earth-to-space)").map(|s| s.name),
            Some("Fixed-Satellite")
        );
        assert_eq!(identify_service("FIXED 5.480").map(|s| s.name), Some("Fixed"));
        assert_eq!(
            identify_service("MOBILE except aeronautical mobile R").map(|s| s.name),
            Some("Mobile except aeronautical mobile")
        );
        assert_eq!(identify_service("FIXEDLINE"), None);
        assert_eq!(identify_service("Weather chatter"), None);
    }

    #[test]
    fn hyphenated_aliases_resolve_to_the_canonical_name() {
        let allocation = parse("AERONAUTICAL RADIONAVI-GATION 5.444");
        assert_eq!(allocation.service, "Aeronautical Radionavigation");
        assert_eq!(allocation.footnotes, vec!["5.444"]);
    }

    #[test]
    fn tier_modifiers_and_footnotes() {
        let primary = parse("FIXED-SATELLITE (space-to-Earth) (non-GSO) 5.441 5.484A");
        assert_eq!(primary.service, "Fixed-Satellite");
        assert_eq!(primary.tier, Tier::Primary);
        assert_eq!(primary.modifiers, vec!["space-to-Earth", "non-GSO"]);
        assert_eq!(primary.footnotes, vec!["5.441", "5.484A"]);

        let secondary = parse("Radiolocation");
        assert_eq!(secondary.tier, Tier::Secondary);
        assert!(secondary.modifiers.is_empty());

        let passive = parse("EARTH EXPLORATION-SATELLITE (passive)");
        assert_eq!(passive.service, "Earth Exploration-Satellite");
        assert_eq!(passive.modifiers, vec!["passive"]);
    }

    #[test]
    fn unknown_and_malformed_lines_are_rejected() {
        assert!(matches!(
            parse_allocation("5.340 5.341"),
            Err(KernelError::InvalidRecord(message)) if message.contains("no known service")
        ));
        assert!(matches!(
            parse_allocation("MOBILE (space-to-Earth"),
            Err(KernelError::InvalidRecord(message)) if message.contains("unclosed")
        ));
    }
}
