use std::fmt::{self, Display};

///
/// A (chromosome, position) coordinate identifying a row across files.
///
/// Ordering is chromosome label first, compared as plain strings (so `chr10`
/// sorts before `chr2`), then position.
///
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Clone)]
pub struct Locus {
    pub chrom: String,
    pub pos: u64,
}

impl Locus {
    pub fn new(chrom: impl Into<String>, pos: u64) -> Self {
        Locus {
            chrom: chrom.into(),
            pos,
        }
    }

    ///
    /// Identity of the merged document stored for this locus: `chrom:pos`.
    ///
    pub fn document_id(&self) -> String {
        format!("{}:{}", self.chrom, self.pos)
    }
}

impl Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chrom, self.pos)
    }
}
