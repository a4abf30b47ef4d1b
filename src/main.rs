use lookahead_seq::{
    CpalOutput, Note, NoteSequence, Scale, Sequencer, SequencerConfig, WaveformType,
};
use std::time::Duration;

const DEMO_TEMPO: f64 = 120.0;

/// Pentatonic phrase over one 8-beat loop: (start, length, note number)
const DEMO_PHRASE: &[(f64, f64, i32)] = &[
    (0.0, 0.5, 0),
    (0.5, 0.5, 2),
    (1.0, 0.5, 4),
    (1.5, 0.5, 7),
    (2.0, 1.0, 9),
    (3.0, 1.0, 7),
    (4.0, 0.5, 4),
    (4.5, 0.5, 2),
    (5.0, 1.0, 0),
    (6.0, 2.0, -5),
];

fn main() {
    println!("=== Lookahead Sequencer ===\n");

    // Optional RON config file as the only argument
    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| SequencerConfig::from_ron(&text).map_err(|e| e.to_string()))
        {
            Ok(config) => {
                println!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                eprintln!("ERROR: {}: {}", path, e);
                return;
            }
        },
        None => SequencerConfig {
            waveform: WaveformType::Triangle,
            ..SequencerConfig::default()
        },
    };

    let sequence = NoteSequence::new_shared();
    for &(start, length, number) in DEMO_PHRASE {
        match Note::new(start, length, number) {
            Ok(note) => {
                sequence.borrow_mut().add_note(note);
            }
            Err(e) => eprintln!("Skipping note: {}", e),
        }
    }
    sequence
        .borrow_mut()
        .add_change_listener(|| println!("  (sequence changed)"));

    println!("Audio output initialisation...");
    let output = match CpalOutput::new() {
        Ok(output) => output,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };
    println!("Sample rate: {} Hz", output.sample_rate());

    let scale = match Scale::equal_temperament(12, 261.63) {
        Ok(scale) => scale,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };

    let mut sequencer =
        match Sequencer::with_config(scale, DEMO_TEMPO, output, sequence.clone(), config) {
            Ok(sequencer) => sequencer,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return;
            }
        };

    println!("\n▶ Play at {} BPM", sequencer.tempo());
    sequencer.play(Duration::ZERO);
    sequencer.run_realtime(Duration::from_secs(4));

    println!("⏸ Pause at beat {:.2}", sequencer.playhead());
    sequencer.pause(Duration::ZERO);
    sequencer.run_realtime(Duration::from_secs(1));

    println!("▶ Resume from beat {:.2}", sequencer.resume_beat());
    sequencer.play(Duration::ZERO);
    sequencer.run_realtime(Duration::from_secs(2));

    match sequencer.change_tempo(160.0) {
        Ok(()) => println!("Tempo → {} BPM", sequencer.tempo()),
        Err(e) => eprintln!("ERROR: {}", e),
    }

    // Edit while playing: the next loop picks it up
    if let Ok(note) = Note::new(7.0, 0.5, 12) {
        sequence.borrow_mut().add_note(note);
    }
    sequencer.run_realtime(Duration::from_secs(6));

    println!("⏹ Stop");
    sequencer.stop(Duration::from_millis(250));
    sequencer.run_realtime(Duration::from_millis(500));

    println!(
        "\nDone ({} tones dropped)",
        sequencer.output().dropped_tones()
    );
}
