macro_rules! tsc_start {
    ( $start:ident ) => {
        #[cfg(feature = "timing")]
        let $start = std::time::Instant::now();
    };
}

macro_rules! tsc_record {
    ( $timers:expr, $timer:expr, $start:ident ) => {
        #[cfg(feature = "timing")]
        $timers.record($timer, $start.elapsed().as_nanos() as u64, 1);
    };
    ( $timers:expr, $timer:expr, $start:ident, $sample:literal ) => {
        #[cfg(feature = "timing")]
        $timers.record($timer, $start.elapsed().as_nanos() as u64, $sample);
    };
}
