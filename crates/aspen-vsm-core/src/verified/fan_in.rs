//! Fan-in compatibility of material revisions.

/// Check whether every path into a material agreed on one head revision.
///
/// When the same material feeds the root through several ancestors, each
/// trigger cause names the revision it was built from. More than one distinct
/// head means the root was built from inconsistent sources.
///
/// # Arguments
///
/// * `heads` - Distinct head revision ids seen for one material
///
/// # Returns
///
/// `true` if at most one head was seen.
///
/// # Example
///
/// ```
/// use aspen_vsm_core::verified::is_fan_in_compatible;
///
/// assert!(is_fan_in_compatible::<&str>(&[]));
/// assert!(is_fan_in_compatible(&["a1"]));
/// assert!(!is_fan_in_compatible(&["a1", "b2"]));
/// ```
#[inline]
pub fn is_fan_in_compatible<S: AsRef<str>>(heads: &[S]) -> bool {
    match heads.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|head| head.as_ref() == first.as_ref()),
    }
}
