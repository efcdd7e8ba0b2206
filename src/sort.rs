/// Result ordering understood by the engine.
///
/// Each key comes in an ascending/descending pair; codes run 1–24
/// contiguously in declaration order.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    NameAscending = 1,
    NameDescending = 2,
    PathAscending = 3,
    PathDescending = 4,
    SizeAscending = 5,
    SizeDescending = 6,
    TypeAscending = 7,
    TypeDescending = 8,
    DateCreatedAscending = 9,
    DateCreatedDescending = 10,
    DateModifiedAscending = 11,
    DateModifiedDescending = 12,
    AttributesAscending = 13,
    AttributesDescending = 14,
    FileListFilenameAscending = 15,
    FileListFilenameDescending = 16,
    RunCountAscending = 17,
    RunCountDescending = 18,
    DateRecentlyChangedAscending = 19,
    DateRecentlyChangedDescending = 20,
    DateAccessedAscending = 21,
    DateAccessedDescending = 22,
    DateRunAscending = 23,
    DateRunDescending = 24,
}

impl Sort {
    /// Every sort order, in code order.
    pub const ALL: [Sort; 24] = [
        Sort::NameAscending,
        Sort::NameDescending,
        Sort::PathAscending,
        Sort::PathDescending,
        Sort::SizeAscending,
        Sort::SizeDescending,
        Sort::TypeAscending,
        Sort::TypeDescending,
        Sort::DateCreatedAscending,
        Sort::DateCreatedDescending,
        Sort::DateModifiedAscending,
        Sort::DateModifiedDescending,
        Sort::AttributesAscending,
        Sort::AttributesDescending,
        Sort::FileListFilenameAscending,
        Sort::FileListFilenameDescending,
        Sort::RunCountAscending,
        Sort::RunCountDescending,
        Sort::DateRecentlyChangedAscending,
        Sort::DateRecentlyChangedDescending,
        Sort::DateAccessedAscending,
        Sort::DateAccessedDescending,
        Sort::DateRunAscending,
        Sort::DateRunDescending,
    ];

    /// The wire code passed to `Everything_SetSort`.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a sort order by wire code. `None` outside 1–24.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1..=24 => Some(Self::ALL[(code - 1) as usize]),
            _ => None,
        }
    }

    pub fn is_descending(self) -> bool {
        self.code() % 2 == 0
    }
}

impl From<Sort> for u32 {
    fn from(sort: Sort) -> Self {
        sort.code()
    }
}

impl TryFrom<u32> for Sort {
    type Error = u32;

    /// Fails with the rejected code.
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Sort::from_code(code).ok_or(code)
    }
}
