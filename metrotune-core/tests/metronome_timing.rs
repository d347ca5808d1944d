//! Timing properties of the lookahead metronome, driven by a manual clock.

use std::rc::Rc;

use metrotune_core::clock::{AudioClock, ManualClock};
use metrotune_core::config::MetronomeSettings;
use metrotune_core::scheduler::{Accent, BeatScheduler, MAX_TEMPO, MIN_TEMPO, Meter, Pulse};

/// Length of one simulated display frame.
const FRAME_SECS: f64 = 1.0 / 60.0;

fn new_scheduler(tempo: u32, meter: Meter) -> (BeatScheduler<ManualClock>, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let shared = clock.clone();
    let settings = MetronomeSettings {
        tempo,
        beats_per_measure: meter,
        volume: 1.0,
    };
    (BeatScheduler::new(&settings, move || Ok(shared.clone())), clock)
}

/// Ticks once per frame until the clock reaches `until` and returns every
/// pulse scheduled along the way.
fn run_for(scheduler: &mut BeatScheduler<ManualClock>, clock: &ManualClock, until: f64) -> Vec<Pulse> {
    let mut pulses = Vec::new();
    while clock.current_time() < until {
        pulses.extend(scheduler.tick());
        clock.advance(FRAME_SECS);
    }
    pulses
}

#[test]
fn pulse_spacing_equals_beat_interval_for_every_tempo_and_meter() {
    for meter in Meter::ALL {
        for tempo in (MIN_TEMPO..=MAX_TEMPO).step_by(7).chain([MAX_TEMPO]) {
            let (mut scheduler, clock) = new_scheduler(tempo, meter);
            scheduler.start().unwrap();
            let pulses = run_for(&mut scheduler, &clock, 5.0);
            assert!(pulses.len() >= 3, "{tempo} BPM produced too few pulses");

            let interval = 60.0 / tempo as f64;
            for pair in pulses.windows(2) {
                let gap = pair[1].time - pair[0].time;
                assert!(
                    (gap - interval).abs() < 1e-9,
                    "{tempo} BPM {}: gap {gap} != {interval}",
                    meter.label()
                );
            }
        }
    }
}

#[test]
fn pulses_are_time_ordered_and_match_queued_tones() {
    let (mut scheduler, clock) = new_scheduler(173, Meter::Three);
    scheduler.start().unwrap();
    let pulses = run_for(&mut scheduler, &clock, 3.0);
    let tones = clock.tones();

    assert_eq!(pulses.len(), tones.len());
    for (pulse, tone) in pulses.iter().zip(&tones) {
        assert_eq!(pulse.time, tone.start_time);
        assert_eq!(pulse.accent.frequency(), tone.frequency);
    }
    assert!(pulses.windows(2).all(|p| p[0].time <= p[1].time));
}

#[test]
fn four_four_accents_every_fourth_pulse() {
    let (mut scheduler, clock) = new_scheduler(200, Meter::Four);
    scheduler.start().unwrap();
    let pulses = run_for(&mut scheduler, &clock, 4.0);

    for pulse in &pulses {
        let expected = if pulse.index % 4 == 0 {
            Accent::Primary
        } else {
            Accent::Normal
        };
        assert_eq!(pulse.accent, expected, "pulse {}", pulse.index);
    }
}

#[test]
fn six_eight_has_distinct_secondary_accent() {
    let (mut scheduler, clock) = new_scheduler(180, Meter::SixEight);
    scheduler.start().unwrap();
    let pulses = run_for(&mut scheduler, &clock, 4.0);

    for pulse in &pulses {
        let expected = match pulse.index % 6 {
            0 => Accent::Primary,
            3 => Accent::Secondary,
            _ => Accent::Normal,
        };
        assert_eq!(pulse.accent, expected, "pulse {}", pulse.index);
    }
    let frequencies: Vec<f32> = [Accent::Primary, Accent::Secondary, Accent::Normal]
        .iter()
        .map(|a| a.frequency())
        .collect();
    assert_eq!(frequencies, vec![1000.0, 800.0, 500.0]);
}

#[test]
fn one_twenty_in_four_four_sounds_eight_pulses_before_four_seconds() {
    let (mut scheduler, clock) = new_scheduler(120, Meter::Four);
    scheduler.start().unwrap();
    let pulses = run_for(&mut scheduler, &clock, 4.0);

    // The lookahead also queues the pulse due at exactly 4 s.
    let sounded: Vec<&Pulse> = pulses.iter().filter(|p| p.time < 4.0).collect();
    assert_eq!(sounded.len(), 8);

    let accented: Vec<u64> = sounded
        .iter()
        .filter(|p| p.accent == Accent::Primary)
        .map(|p| p.index)
        .collect();
    assert_eq!(accented, vec![0, 4]);
}

#[test]
fn stopping_twice_matches_stopping_once() {
    let (mut once, once_clock) = new_scheduler(120, Meter::Four);
    let (mut twice, twice_clock) = new_scheduler(120, Meter::Four);
    for (scheduler, clock) in [(&mut once, &once_clock), (&mut twice, &twice_clock)] {
        scheduler.start().unwrap();
        run_for(scheduler, clock, 1.0);
    }

    once.stop();
    twice.stop();
    twice.stop();

    assert_eq!(once.is_running(), twice.is_running());
    assert_eq!(once.beat_counter(), twice.beat_counter());
    assert_eq!(once.current_beat(), twice.current_beat());

    let after_once = run_for(&mut once, &once_clock, 3.0);
    let after_twice = run_for(&mut twice, &twice_clock, 3.0);
    assert!(after_once.is_empty());
    assert!(after_twice.is_empty());
}

#[test]
fn restart_resets_counter_and_anchors_to_clock() {
    let (mut scheduler, clock) = new_scheduler(90, Meter::Three);
    scheduler.start().unwrap();
    run_for(&mut scheduler, &clock, 2.0);
    scheduler.stop();

    clock.advance(1.234);
    let restart_time = clock.current_time();
    scheduler.start().unwrap();
    let pulses = scheduler.tick();

    assert_eq!(pulses[0].index, 0);
    assert_eq!(pulses[0].time, restart_time);
    assert_eq!(pulses[0].accent, Accent::Primary);
}

#[test]
fn jittery_ticks_do_not_shift_pulse_times() {
    let (mut scheduler, clock) = new_scheduler(150, Meter::Four);
    scheduler.start().unwrap();

    // Frame lengths that wander between 5 ms and 60 ms.
    let frames = [0.005, 0.06, 0.017, 0.033, 0.009, 0.051, 0.016];
    let mut pulses = Vec::new();
    let mut i = 0;
    while clock.current_time() < 6.0 {
        pulses.extend(scheduler.tick());
        clock.advance(frames[i % frames.len()]);
        i += 1;
    }

    let interval = 60.0 / 150.0;
    for (n, pulse) in pulses.iter().enumerate() {
        assert!((pulse.time - n as f64 * interval).abs() < 1e-9);
    }
}

#[test]
fn tempo_change_mid_beat_keeps_every_beat_of_the_measure() {
    let (mut scheduler, clock) = new_scheduler(60, Meter::Four);
    scheduler.start().unwrap();
    let mut pulses = run_for(&mut scheduler, &clock, 0.85);
    scheduler.set_tempo(120);
    pulses.extend(run_for(&mut scheduler, &clock, 3.0));

    let indices: Vec<u64> = pulses.iter().map(|p| p.index).collect();
    let expected: Vec<u64> = (0..pulses.len() as u64).collect();
    assert_eq!(indices, expected);
    for pulse in &pulses {
        assert_eq!(u64::from(pulse.beat_in_measure), pulse.index % 4);
    }
    assert_eq!(pulses[4].accent, Accent::Primary);
    assert!(pulses.windows(2).all(|w| w[1].time > w[0].time));
}
