use std::sync::Arc;
use std::time::Duration;

use tapwatch_capture::{SimCounter, SimulatedOcr, SimulatedScreen};
use tapwatch_traits::{Capture, CaptureFailure, ManualClock, OcrFailure, OcrHints, Recognizer, Region};

const T: Duration = Duration::from_secs(1);

fn region() -> Region {
    Region::new("Tap Ninja", 100, 40, 220, 36)
}

fn read(screen: &mut SimulatedScreen) -> Result<String, String> {
    let frame = screen.capture(&region(), T).map_err(|e| e.to_string())?;
    SimulatedOcr
        .recognize(&frame, &OcrHints::default(), T)
        .map_err(|e| e.to_string())
}

#[test]
fn counter_grows_with_the_clock() {
    let clock = ManualClock::new();
    let mut screen = SimulatedScreen::new(Arc::new(clock.clone())).with_counter(
        region(),
        SimCounter {
            start: 998.0,
            rate_per_sec: 2.0,
            ..SimCounter::default()
        },
    );
    assert_eq!(read(&mut screen).as_deref(), Ok("998"));
    clock.advance(Duration::from_secs(5));
    assert_eq!(read(&mut screen).as_deref(), Ok("1,008"));
    assert_eq!(screen.value_at(&region(), 5_000), Some(1008.0));
}

#[test]
fn resets_glitches_and_blanks_fire_on_schedule() {
    let clock = ManualClock::new();
    let mut screen = SimulatedScreen::new(Arc::new(clock.clone())).with_counter(
        region(),
        SimCounter {
            start: 50.0,
            rate_per_sec: 1.0,
            reset_every: 4,
            glitch_every: 2,
            blank_every: 3,
        },
    );
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(read(&mut screen));
        clock.advance(Duration::from_secs(10));
    }
    assert_eq!(seen[0].as_deref(), Ok("50"));
    // 2nd capture duplicates the leading digit
    assert_eq!(seen[1].as_deref(), Ok("660"));
    // 3rd capture is blank
    assert_eq!(seen[2].as_deref(), Err(&OcrFailure::NoTextDetected.to_string()));
    // 4th capture spends the counter (and glitches a single zero)
    assert_eq!(seen[3].as_deref(), Ok("00"));
}

#[test]
fn unknown_region_and_failing_screen_report_missing_window() {
    let clock = ManualClock::new();
    let mut screen = SimulatedScreen::new(Arc::new(clock));
    let err = screen.capture(&region(), T).expect_err("no counter");
    assert_eq!(err, CaptureFailure::WindowNotFound("Tap Ninja".into()));

    let mut screen = screen
        .with_counter(region(), SimCounter::default())
        .failing(true);
    assert!(matches!(
        screen.capture(&region(), T),
        Err(CaptureFailure::WindowNotFound(_))
    ));
}

#[test]
fn zero_sized_region_is_invalid() {
    let clock = ManualClock::new();
    let mut screen = SimulatedScreen::new(Arc::new(clock));
    let bad = Region::new("Tap Ninja", 0, 0, 0, 10);
    assert!(matches!(
        screen.capture(&bad, T),
        Err(CaptureFailure::RegionInvalid(_))
    ));
}
