use smallvec::SmallVec;

/// One access step into a value tree: a map key or a list index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// An access path from the root of an instance down to one node.
///
/// The empty path addresses the root itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[Step; 4]>);

impl Path {
    pub fn root() -> Self {
        Path(SmallVec::new())
    }

    pub fn key(name: impl Into<String>) -> Self {
        Path(SmallVec::from_vec(vec![Step::Key(name.into())]))
    }

    pub fn index(i: usize) -> Self {
        Path(SmallVec::from_vec(vec![Step::Index(i)]))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn push(&mut self, step: Step) {
        self.0.push(step);
    }

    pub fn join(&self, step: Step) -> Path {
        let mut p = self.clone();
        p.push(step);
        p
    }

    pub fn join_key(&self, name: impl Into<String>) -> Path {
        self.join(Step::Key(name.into()))
    }

    pub fn join_index(&self, i: usize) -> Path {
        self.join(Step::Index(i))
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// True when either path is a prefix of the other (including equality).
    /// This is the affectedness relation used by change notification: a
    /// mutation under a read, or a read under a mutation, both invalidate.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (i, step) in self.0.iter().enumerate() {
            match step {
                Step::Key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{k}")?;
                }
                Step::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(name: &str) -> Self {
        Path::key(name)
    }
}
