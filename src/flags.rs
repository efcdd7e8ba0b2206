use bitflags::bitflags;

bitflags! {
    /// Result attributes the engine loads on the next query.
    ///
    /// Reading an attribute that wasn't requested fails with
    /// [`NativeErrorKind::InvalidRequest`](crate::NativeErrorKind::InvalidRequest).
    /// The engine's default is `FILE_NAME | PATH`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestFlags: u32 {
        const FILE_NAME                           = 0x0000_0001;
        const PATH                                = 0x0000_0002;
        const FULL_PATH_AND_FILE_NAME             = 0x0000_0004;
        const EXTENSION                           = 0x0000_0008;
        const SIZE                                = 0x0000_0010;
        const DATE_CREATED                        = 0x0000_0020;
        const DATE_MODIFIED                       = 0x0000_0040;
        const DATE_ACCESSED                       = 0x0000_0080;
        const ATTRIBUTES                          = 0x0000_0100;
        const FILE_LIST_FILE_NAME                 = 0x0000_0200;
        const RUN_COUNT                           = 0x0000_0400;
        const DATE_RUN                            = 0x0000_0800;
        const DATE_RECENTLY_CHANGED               = 0x0000_1000;
        const HIGHLIGHTED_FILE_NAME               = 0x0000_2000;
        const HIGHLIGHTED_PATH                    = 0x0000_4000;
        const HIGHLIGHTED_FULL_PATH_AND_FILE_NAME = 0x0000_8000;
    }
}

impl Default for RequestFlags {
    fn default() -> Self {
        RequestFlags::FILE_NAME | RequestFlags::PATH
    }
}
