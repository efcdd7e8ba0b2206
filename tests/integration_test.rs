use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use everything_wrapper::abi::{entry_point, Marshal, ENTRY_POINTS};
use everything_wrapper::wide::from_wide;
use everything_wrapper::{
    session, CancelToken, Clock, EngineVersion, Everything, EverythingError, NativeApi,
    NativeErrorKind, RequestFlags, Sort,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// In-memory engine state shared between a stub and the test body.
#[derive(Default)]
struct EngineState {
    search:           Vec<u16>,
    null_search:      bool,
    sort:             u32,
    max:              u32,
    offset:           u32,
    query_ok:         bool,
    /// `None` means loaded from the start; `Some(n)` loads on the n-th poll.
    loaded_after:     Option<u32>,
    polls:            u32,
    last_error:       u32,
    paths:            Vec<String>,
    /// Overrides `paths.len()` as the reported result count.
    num_results:      Option<u32>,
    null_file_names:  bool,
    /// Fill calls copy nothing and set `InvalidIndex`.
    fail_fill:        bool,
    request_flags:    u32,
    full_path_calls:  Vec<(u32, Option<usize>)>,
    queries:          u32,
    cleanups:         u32,
    resets:           u32,
}

#[derive(Clone, Default)]
struct StubEngine(Arc<Mutex<EngineState>>);

impl StubEngine {
    fn with_paths(paths: &[&str]) -> Self {
        let stub = Self::default();
        stub.state().paths = paths.iter().map(|p| p.to_string()).collect();
        stub.state().query_ok = true;
        stub
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.0.lock().unwrap()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('\\').next().unwrap_or(path)
}

impl NativeApi for StubEngine {
    fn set_search_w(&self, search: &[u16]) {
        self.state().search = search.to_vec();
    }

    fn get_search_w(&self) -> Option<Vec<u16>> {
        let s = self.state();
        if s.null_search {
            None
        } else {
            Some(s.search.clone())
        }
    }

    fn set_sort(&self, sort: u32) {
        self.state().sort = sort;
    }

    fn get_sort(&self) -> u32 {
        self.state().sort
    }

    fn set_max(&self, max: u32) {
        self.state().max = max;
    }

    fn get_max(&self) -> u32 {
        self.state().max
    }

    fn set_offset(&self, offset: u32) {
        self.state().offset = offset;
    }

    fn get_offset(&self) -> u32 {
        self.state().offset
    }

    fn query_w(&self, _wait: bool) -> bool {
        let mut s = self.state();
        s.queries += 1;
        s.query_ok
    }

    fn get_num_results(&self) -> u32 {
        let s = self.state();
        s.num_results.unwrap_or(s.paths.len() as u32)
    }

    fn get_tot_results(&self) -> u32 {
        self.state().paths.len() as u32 * 10
    }

    fn get_result_full_path_name_w(&self, index: u32, buf: Option<&mut [u16]>) -> u32 {
        let mut s = self.state();
        s.full_path_calls.push((index, buf.as_ref().map(|b| b.len())));

        let Some(path) = s.paths.get(index as usize).cloned() else {
            s.last_error = 6;
            return 0;
        };
        let units: Vec<u16> = path.encode_utf16().collect();
        match buf {
            None => units.len() as u32,
            Some(_) if s.fail_fill => {
                s.last_error = 6;
                0
            }
            Some(buf) => {
                let n = units.len().min(buf.len() - 1);
                buf[..n].copy_from_slice(&units[..n]);
                buf[n] = 0;
                n as u32
            }
        }
    }

    fn get_result_file_name_w(&self, index: u32) -> Option<Vec<u16>> {
        let mut s = self.state();
        if s.null_file_names {
            s.last_error = 7;
            return None;
        }
        match s.paths.get(index as usize) {
            Some(p) => Some(file_name(p).encode_utf16().collect()),
            None => {
                s.last_error = 6;
                None
            }
        }
    }

    fn is_db_loaded(&self) -> bool {
        let mut s = self.state();
        s.polls += 1;
        match s.loaded_after {
            None => true,
            Some(n) => s.polls >= n,
        }
    }

    fn get_major_version(&self) -> u32 {
        1
    }

    fn get_last_error(&self) -> u32 {
        self.state().last_error
    }

    fn clean_up(&self) {
        self.state().cleanups += 1;
    }

    fn reset(&self) {
        let mut s = self.state();
        s.resets += 1;
        s.request_flags = RequestFlags::default().bits();
    }

    fn is_fast_sort(&self, sort: u32) -> bool {
        sort <= 4
    }

    fn is_file_result(&self, index: u32) -> bool {
        self.state().paths[index as usize].contains('.')
    }

    fn is_folder_result(&self, index: u32) -> bool {
        !self.is_file_result(index)
    }

    fn is_volume_result(&self, index: u32) -> bool {
        self.state().paths[index as usize].ends_with(":\\")
    }

    fn set_request_flags(&self, flags: u32) {
        self.state().request_flags = flags;
    }

    fn get_request_flags(&self) -> u32 {
        self.state().request_flags
    }

    fn get_result_size(&self, index: u32) -> Option<u64> {
        self.requested(index, RequestFlags::SIZE, |path| path.len() as u64 * 1024)
    }

    fn get_result_date_created(&self, index: u32) -> Option<u64> {
        self.requested(index, RequestFlags::DATE_CREATED, |_| CREATED_TICKS)
    }

    fn get_result_date_modified(&self, index: u32) -> Option<u64> {
        self.requested(index, RequestFlags::DATE_MODIFIED, |_| CREATED_TICKS + u64::from(index))
    }

    fn get_result_extension_w(&self, index: u32) -> Option<Vec<u16>> {
        self.requested(index, RequestFlags::EXTENSION, |path| {
            path.rsplit_once('.').map_or("", |(_, ext)| ext).encode_utf16().collect()
        })
    }

    fn get_minor_version(&self) -> u32 {
        4
    }

    fn get_revision(&self) -> u32 {
        1
    }

    fn get_build_number(&self) -> u32 {
        1024
    }
}

/// 2024-01-01T00:00:00Z as `FILETIME` ticks.
const CREATED_TICKS: u64 = 133_485_408_000_000_000;

impl StubEngine {
    /// Answer a per-result attribute read the way the engine does: an
    /// unrequested attribute sets `InvalidRequest`, a bad index `InvalidIndex`.
    fn requested<T>(&self, index: u32, flag: RequestFlags, read: impl FnOnce(&str) -> T) -> Option<T> {
        let mut s = self.state();
        if !RequestFlags::from_bits_truncate(s.request_flags).contains(flag) {
            s.last_error = 8;
            return None;
        }
        match s.paths.get(index as usize) {
            Some(path) => Some(read(path.as_str())),
            None => {
                s.last_error = 6;
                None
            }
        }
    }
}

/// A clock that only moves when slept on.
struct FakeClock {
    start:   Instant,
    elapsed: Cell<Duration>,
    sleeps:  Cell<u32>,
}

impl FakeClock {
    fn new() -> Self {
        Self { start: Instant::now(), elapsed: Cell::new(Duration::ZERO), sleeps: Cell::new(0) }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn sleep(&self, d: Duration) {
        self.elapsed.set(self.elapsed.get() + d);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

fn open(stub: &StubEngine) -> Everything {
    session().api(stub.clone()).load_timeout(Duration::from_secs(1)).open().unwrap()
}

const PATHS: [&str; 3] = [
    r"C:\videos\holiday.mkv",
    r"C:\videos\2024\birthday.mp4",
    r"D:\archive\clip.avi",
];

// ---------------------------------------------------------------------------
// Configuration pass-through
// ---------------------------------------------------------------------------

#[test]
fn every_sort_code_round_trips() {
    let stub = StubEngine::default();
    let everything = open(&stub);

    for sort in Sort::ALL {
        everything.set_sort(sort);
        assert_eq!(everything.sort_code(), sort.code());
        assert_eq!(everything.sort(), Some(sort));
    }
}

#[test]
fn unknown_sort_code_reads_back_as_none() {
    let stub = StubEngine::default();
    let everything = open(&stub);

    everything.set_sort_code(42);
    assert_eq!(everything.sort_code(), 42);
    assert_eq!(everything.sort(), None);
}

#[test]
fn offset_and_max_round_trip() {
    let stub = StubEngine::default();
    let everything = open(&stub);

    for n in [0, 1, 100, 65_536, u32::MAX] {
        everything.set_offset(n);
        assert_eq!(everything.offset(), n);
        everything.set_max_results(n);
        assert_eq!(everything.max_results(), n);
    }
}

#[test]
fn non_ascii_search_round_trips() {
    let stub = StubEngine::default();
    let everything = open(&stub);

    let text = "ext:mkv 写真 größe \u{1F3AC}";
    everything.set_search(text);

    assert_eq!(stub.state().search.last(), Some(&0), "pushed search must be null-terminated");
    assert_eq!(everything.search().unwrap(), text);
}

// ---------------------------------------------------------------------------
// Index wait
// ---------------------------------------------------------------------------

#[test]
fn wait_returns_immediately_when_loaded() {
    let stub = StubEngine::default();
    let everything = open(&stub);
    let clock = FakeClock::new();

    everything.wait_db_loaded_with(&clock, &CancelToken::new()).unwrap();

    assert_eq!(clock.sleeps.get(), 0);
    assert_eq!(stub.state().polls, 1);
}

#[test]
fn wait_times_out_when_never_loaded() {
    let stub = StubEngine::default();
    stub.state().loaded_after = Some(u32::MAX);
    let everything = session()
        .api(stub.clone())
        .poll_interval(Duration::from_millis(100))
        .load_timeout(Duration::from_secs(1))
        .open()
        .unwrap();
    let clock = FakeClock::new();

    let err = everything.wait_db_loaded_with(&clock, &CancelToken::new()).unwrap_err();

    match err {
        EverythingError::Timeout { waited } => assert_eq!(waited, Duration::from_secs(1)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(clock.sleeps.get(), 10);
    assert_eq!(stub.state().polls, 11);
}

#[test]
fn wait_succeeds_after_a_few_polls() {
    let stub = StubEngine::default();
    stub.state().loaded_after = Some(4);
    let everything = open(&stub);
    let clock = FakeClock::new();

    everything.wait_db_loaded_with(&clock, &CancelToken::new()).unwrap();

    assert_eq!(clock.sleeps.get(), 3);
    assert!(everything.is_db_loaded());
}

#[test]
fn wait_stops_when_cancelled() {
    let stub = StubEngine::default();
    stub.state().loaded_after = Some(u32::MAX);
    let everything = open(&stub);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = everything.wait_db_loaded_with(&FakeClock::new(), &cancel).unwrap_err();
    assert!(matches!(err, EverythingError::Cancelled));
}

#[test]
fn zero_poll_interval_still_sleeps_between_polls() {
    let stub = StubEngine::default();
    stub.state().loaded_after = Some(u32::MAX);
    let everything = session()
        .api(stub.clone())
        .poll_interval(Duration::ZERO)
        .load_timeout(Duration::from_millis(10))
        .open()
        .unwrap();
    let clock = FakeClock::new();

    let err = everything.wait_db_loaded_with(&clock, &CancelToken::new()).unwrap_err();

    assert!(matches!(err, EverythingError::Timeout { .. }));
    assert_eq!(clock.sleeps.get(), 10, "zero interval is raised to the 1 ms floor");
    assert_eq!(stub.state().polls, 11);
}

#[test]
fn open_can_wait_for_the_index_with_real_clock() {
    let stub = StubEngine::default();
    stub.state().loaded_after = Some(u32::MAX);

    let err = session()
        .api(stub.clone())
        .poll_interval(Duration::from_millis(5))
        .load_timeout(Duration::from_millis(30))
        .wait_for_db(true)
        .open()
        .unwrap_err();

    assert!(matches!(err, EverythingError::Timeout { .. }));
    assert_eq!(stub.state().cleanups, 1, "a session that failed to open still cleans up");
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[test]
fn path_iter_yields_every_result_in_order() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);
    assert!(everything.query());

    let mut iter = everything.path_iter();
    assert_eq!(iter.len(), 3);

    let paths: Vec<String> = iter.by_ref().map(Result::unwrap).collect();
    assert_eq!(paths, PATHS);

    assert!(iter.next().is_none(), "an exhausted iterator stays exhausted");
}

#[test]
fn file_name_iter_yields_bare_names() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);
    everything.query();

    let names: Vec<String> = everything.file_name_iter().map(Result::unwrap).collect();
    assert_eq!(names, ["holiday.mkv", "birthday.mp4", "clip.avi"]);
}

#[test]
fn iter_snapshots_the_result_count() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);

    let iter = everything.path_iter();
    stub.state().paths.push(r"E:\late.txt".into());

    assert_eq!(iter.count(), 3);
    assert_eq!(everything.path_iter().count(), 4, "a fresh iterator re-reads the count");
}

#[test]
fn iter_element_failures_surface_per_item() {
    let stub = StubEngine::with_paths(&PATHS[..2]);
    stub.state().num_results = Some(3);
    let everything = open(&stub);

    let items: Vec<_> = everything.file_name_iter().collect();
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok() && items[1].is_ok());
    assert_eq!(
        items[2].as_ref().unwrap_err().native_kind(),
        Some(NativeErrorKind::InvalidIndex)
    );
}

#[test]
fn result_path_measures_then_fills() {
    let path = r"C:\abc.txt";
    assert_eq!(path.encode_utf16().count(), 10);

    let stub = StubEngine::with_paths(&[path]);
    let everything = open(&stub);

    assert_eq!(everything.result_path(0).unwrap(), path);
    assert_eq!(stub.state().full_path_calls, vec![(0, None), (0, Some(11))]);
}

#[test]
fn result_path_failure_carries_last_error() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);

    let err = everything.result_path(7).unwrap_err();
    assert_eq!(err.native_kind(), Some(NativeErrorKind::InvalidIndex));
    assert_eq!(stub.state().full_path_calls, vec![(7, None)], "no fill call after a failed measure");
}

#[test]
fn result_path_fill_failure_is_an_error() {
    let stub = StubEngine::with_paths(&PATHS);
    stub.state().fail_fill = true;
    let everything = open(&stub);

    let err = everything.result_path(0).unwrap_err();
    assert_eq!(err.native_kind(), Some(NativeErrorKind::InvalidIndex));

    let len = PATHS[0].encode_utf16().count();
    assert_eq!(stub.state().full_path_calls, vec![(0, None), (0, Some(len + 1))]);
}

#[test]
fn request_flags_round_trip_and_reset() {
    let stub = StubEngine::default();
    let everything = open(&stub);

    let flags = RequestFlags::FULL_PATH_AND_FILE_NAME | RequestFlags::SIZE | RequestFlags::DATE_MODIFIED;
    everything.set_request_flags(flags);
    assert_eq!(stub.state().request_flags, 0x54);
    assert_eq!(everything.request_flags(), flags);

    everything.reset();
    assert_eq!(everything.request_flags(), RequestFlags::FILE_NAME | RequestFlags::PATH);
}

#[test]
fn requested_attributes_are_read_back() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);
    everything.set_request_flags(
        RequestFlags::SIZE
            | RequestFlags::DATE_CREATED
            | RequestFlags::DATE_MODIFIED
            | RequestFlags::EXTENSION,
    );
    everything.query();

    assert_eq!(everything.result_size(2).unwrap(), PATHS[2].len() as u64 * 1024);
    assert_eq!(everything.result_date_created(1).unwrap(), CREATED_TICKS);
    assert_eq!(everything.result_date_modified(1).unwrap(), CREATED_TICKS + 1);
    assert_eq!(everything.result_extension(0).unwrap(), "mkv");
}

#[test]
fn unrequested_attribute_is_an_invalid_request() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);
    everything.set_request_flags(RequestFlags::default());
    everything.query();

    for err in [
        everything.result_size(0).unwrap_err(),
        everything.result_date_created(0).unwrap_err(),
        everything.result_date_modified(0).unwrap_err(),
    ] {
        assert_eq!(err.native_kind(), Some(NativeErrorKind::InvalidRequest));
    }
    assert!(everything.result_extension(0).is_err());
}

#[test]
fn attribute_read_past_the_end_is_an_invalid_index() {
    let stub = StubEngine::with_paths(&PATHS);
    let everything = open(&stub);
    everything.set_request_flags(RequestFlags::SIZE);

    let err = everything.result_size(3).unwrap_err();
    assert_eq!(err.native_kind(), Some(NativeErrorKind::InvalidIndex));
}

#[test]
fn result_flags_pass_through() {
    let stub = StubEngine::with_paths(&[r"C:\", r"C:\docs", r"C:\docs\a.txt"]);
    let everything = open(&stub);

    assert!(everything.is_volume_result(0));
    assert!(everything.is_folder_result(1));
    assert!(everything.is_file_result(2));
    assert_eq!(everything.num_results(), 3);
    assert_eq!(everything.total_results(), 30);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn null_search_raises_mapped_error() {
    let stub = StubEngine::default();
    {
        let mut s = stub.state();
        s.null_search = true;
        s.last_error = 2;
    }
    let everything = open(&stub);

    let err = everything.search().unwrap_err();
    assert!(matches!(err, EverythingError::Native(NativeErrorKind::Ipc)));
    assert!(err.hint().contains("Everything application is running"));
}

#[test]
fn null_file_name_raises_mapped_error() {
    let stub = StubEngine::with_paths(&PATHS);
    stub.state().null_file_names = true;
    let everything = open(&stub);

    let err = everything.result_file_name(0).unwrap_err();
    assert_eq!(err.native_kind(), Some(NativeErrorKind::InvalidCall));
}

#[test]
fn unknown_error_code_maps_to_unknown() {
    let stub = StubEngine::default();
    stub.state().last_error = 99;
    let everything = open(&stub);

    assert_eq!(everything.last_error(), NativeErrorKind::Unknown(99));
    assert_eq!(everything.last_error().code(), 99);
}

#[test]
fn known_error_codes_map_to_kinds() {
    for code in 0..=9 {
        let kind = NativeErrorKind::from_code(code);
        assert!(!matches!(kind, NativeErrorKind::Unknown(_)));
        assert_eq!(kind.code(), code);
    }
    assert!(NativeErrorKind::from_code(0).is_ok());
}

#[test]
fn failed_query_returns_false_not_error() {
    let stub = StubEngine::default();
    {
        let mut s = stub.state();
        s.query_ok = false;
        s.last_error = 2;
    }
    let everything = open(&stub);

    assert!(!everything.query());
    assert_eq!(everything.last_error(), NativeErrorKind::Ipc);

    let err = everything.query_checked().unwrap_err();
    assert_eq!(err.native_kind(), Some(NativeErrorKind::Ipc));
    assert_eq!(stub.state().queries, 2, "no internal retries");
}

#[test]
fn unloadable_library_is_reported() {
    let bogus = tempfile::Builder::new().suffix(".dll").tempfile().unwrap();
    std::fs::write(bogus.path(), b"not a shared library").unwrap();

    let err = session().library(bogus.path()).open().unwrap_err();

    match err {
        EverythingError::Library { path, .. } => assert_eq!(path, bogus.path()),
        other => panic!("expected library error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Engine info & lifecycle
// ---------------------------------------------------------------------------

#[test]
fn reset_version_and_fast_sort_pass_through() {
    let stub = StubEngine::default();
    let everything = open(&stub);

    everything.reset();
    assert_eq!(stub.state().resets, 1);
    assert_eq!(everything.version(), 1);
    assert_eq!(
        everything.engine_version(),
        EngineVersion { major: 1, minor: 4, revision: 1, build: 1024 }
    );
    assert!(everything.is_fast_sort(Sort::PathDescending));
    assert!(!everything.is_fast_sort(Sort::SizeAscending));
}

#[test]
fn cleanup_runs_once() {
    let stub = StubEngine::default();
    open(&stub).cleanup();
    assert_eq!(stub.state().cleanups, 1);
}

#[test]
fn drop_without_cleanup_still_cleans_up() {
    let stub = StubEngine::default();
    drop(Everything::with_api(stub.clone()));
    assert_eq!(stub.state().cleanups, 1);
}

#[test]
fn sessions_can_be_shared_behind_a_mutex() {
    let stub = StubEngine::with_paths(&PATHS);
    let shared = Arc::new(Mutex::new(open(&stub)));

    let worker = {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            let everything = shared.lock().unwrap();
            everything.set_search("clip");
            everything.query();
            everything.path_iter().count()
        })
    };

    assert_eq!(worker.join().unwrap(), 3);
    assert_eq!(from_wide(&stub.state().search), "clip");
}

// ---------------------------------------------------------------------------
// Entry-point table
// ---------------------------------------------------------------------------

#[test]
fn entry_point_table_is_consistent() {
    let mut names: Vec<_> = ENTRY_POINTS.iter().map(|e| e.name).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), ENTRY_POINTS.len(), "duplicate export names");
    assert!(names.iter().all(|n| n.starts_with("Everything_")));

    let full_path = entry_point("Everything_GetResultFullPathNameW").unwrap();
    assert_eq!(full_path.args, &[Marshal::U32, Marshal::WideBuf, Marshal::U32]);
    assert_eq!(full_path.ret, Marshal::U32);

    let query = entry_point("Everything_QueryW").unwrap();
    assert_eq!(query.args, &[Marshal::Bool]);
    assert_eq!(query.ret, Marshal::Bool);

    let size = entry_point("Everything_GetResultSize").unwrap();
    assert_eq!(size.args, &[Marshal::U32, Marshal::I64Out]);
    assert_eq!(size.ret, Marshal::Bool);

    let modified = entry_point("Everything_GetResultDateModified").unwrap();
    assert_eq!(modified.args, &[Marshal::U32, Marshal::FileTimeOut]);

    assert!(entry_point("Everything_SetRequestFlags").is_some());
    assert!(entry_point("Everything_GetResultAttributes").is_none());
}
