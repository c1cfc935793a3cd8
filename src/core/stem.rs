/// Known stem kinds, in display priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StemKind {
    Vocals,
    Drums,
    Bass,
    Other,
    /// Anything the separator produced that we have no special handling for
    /// (e.g. `guitar`, `piano` from six-stem models).
    Extra,
}

impl StemKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "vocals" => StemKind::Vocals,
            "drums" | "percussion" => StemKind::Drums,
            "bass" => StemKind::Bass,
            "other" => StemKind::Other,
            _ => StemKind::Extra,
        }
    }

    pub fn priority(self) -> u8 {
        match self {
            StemKind::Vocals => 0,
            StemKind::Drums => 1,
            StemKind::Bass => 2,
            StemKind::Other => 3,
            StemKind::Extra => 4,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            StemKind::Vocals => "#D291BC",
            StemKind::Drums => "#F59E0B",
            StemKind::Bass => "#3B82F6",
            StemKind::Other | StemKind::Extra => "#10B981",
        }
    }

    /// Channel strip label for a stem called `name`.
    pub fn label(self, name: &str) -> String {
        match self {
            StemKind::Drums => "DRUMS".into(),
            StemKind::Other => "INSTRUMENTS".into(),
            _ => name.to_uppercase(),
        }
    }
}

/// Order `(name, url)` pairs by stem priority. The sort is stable, so
/// unrecognised names keep their incoming order after the known ones.
pub fn sort_stems(stems: &mut [(String, String)]) {
    stems.sort_by_key(|(name, _)| StemKind::from_name(name).priority());
}
