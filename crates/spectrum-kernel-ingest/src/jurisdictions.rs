use spectrum_kernel_core::{KernelError, Region};

const ALIASES: &[(Region, &[&str])] = &[
    (Region::Region1, &["ITU-R1", "ITU Region 1", "ITU R1", "R1", "Region 1", "region_1"]),
    (Region::Region2, &["ITU-R2", "ITU Region 2", "ITU R2", "R2", "Region 2", "region_2"]),
    (Region::Region3, &["ITU-R3", "ITU Region 3", "ITU R3", "R3", "Region 3", "region_3"]),
    (
        Region::National,
        &["National", "USA", "USA Federal", "Fed", "F", "USA Non-Federal", "Non-Fed", "NF"],
    ),
];

/// Map a jurisdiction heading from a table to its scope.
///
/// Matching ignores ASCII case and surrounding whitespace. Federal and
/// non-federal national tables both map to [`Region::National`].
///
/// # Errors
/// Returns [`KernelError::InvalidScope`] for unknown text, and for the
/// combined scope, which is derived rather than authored.
pub fn parse_region(text: &str) -> Result<Region, KernelError> {
    let wanted = text.trim();
    ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| alias.eq_ignore_ascii_case(wanted)))
        .map(|(region, _)| *region)
        .ok_or_else(|| KernelError::InvalidScope(format!("not a valid jurisdiction: `{wanted}`")))
}
