use std::collections::BTreeMap;

/// Fills unset fields of `self` from `defaults`.
///
/// ```
/// # use converge_operator::config::merge::Merge;
/// let mut display_name = Some("Orders".to_owned());
/// display_name.merge(&Some("orders-topic".to_owned()));
/// assert_eq!(display_name.as_deref(), Some("Orders"));
///
/// let mut policy: Option<String> = None;
/// policy.merge(&Some("{}".to_owned()));
/// assert_eq!(policy.as_deref(), Some("{}"));
/// ```
pub trait Merge {
    fn merge(&mut self, defaults: &Self);
}

pub fn merge<T: Merge>(mut declared: T, defaults: &T) -> T {
    declared.merge(defaults);
    declared
}

/// Values that are taken or left whole, never combined field by field.
///
/// A declared tag map, even an empty one, is never extended with observed entries.
pub trait Atomic: Clone {}
impl Atomic for bool {}
impl Atomic for String {}
impl Atomic for BTreeMap<String, String> {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        if self.is_none() {
            self.clone_from(defaults);
        }
    }
}
