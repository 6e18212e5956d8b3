use crate::Id;
use std::collections::{HashMap, HashSet};

/// Generates unique names of the form `<prefix><n>`, counting separately
/// for every prefix.
///
/// A name is never handed out twice, even when two prefixes could spell the
/// same name (`b1` + `0` and `b` + `10`), and never matches a name passed to
/// [NameGenerator::reserve].
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    counters: HashMap<Id, u64>,
    taken: HashSet<Id>,
}

impl NameGenerator {
    /// Mark `names` as used so that they are never generated.
    pub fn reserve<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = Id>,
    {
        self.taken.extend(names)
    }

    /// Number of names generated or reserved so far.
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }

    /// Returns a new name that starts with `prefix`.
    /// ```
    /// # use strata_utils::NameGenerator;
    /// let mut namegen = NameGenerator::default();
    /// assert_eq!(namegen.gen_name("add"), "add0");
    /// assert_eq!(namegen.gen_name("add"), "add1");
    /// ```
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let prefix = prefix.into();
        let counter = self.counters.entry(prefix).or_default();
        loop {
            let name = Id::from(format!("{prefix}{counter}"));
            *counter += 1;
            if self.taken.insert(name) {
                return name;
            }
        }
    }
}
