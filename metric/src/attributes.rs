use std::borrow::Cow;

/// A sorted set of key/value labels identifying one observer within a [`crate::Metric`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Attributes(Vec<(Cow<'static, str>, Cow<'static, str>)>);

impl Attributes {
    /// An empty attribute set, for instruments with a single, unlabeled observer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<&[(&'static str, &'static str)]> for Attributes {
    fn from(pairs: &[(&'static str, &'static str)]) -> Self {
        let mut pairs: Vec<_> = pairs
            .iter()
            .map(|(k, v)| (Cow::Borrowed(*k), Cow::Borrowed(*v)))
            .collect();
        pairs.sort();
        Self(pairs)
    }
}

impl<const N: usize> From<[(&'static str, &'static str); N]> for Attributes {
    fn from(pairs: [(&'static str, &'static str); N]) -> Self {
        Self::from(&pairs[..])
    }
}
