//! Several machines wired together through `feed` and `resume`.

use intcode_machine::{Machine, MachineError, Value, Yield, parse_program};
use itertools::Itertools;
use test_case::test_case;
use thiserror::Error;

#[derive(Debug, Error)]
enum ChainError {
    #[error("Amplifier {0} halted without producing a signal")]
    NoSignal(usize),
    #[error(transparent)]
    MachineError(#[from] MachineError),
}

fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run_series(program: &[Value], phases: &[Value]) -> Result<Value, ChainError> {
    phases
        .iter()
        .enumerate()
        .try_fold(0, |signal, (ix, &phase)| {
            let mut amplifier = Machine::with_inputs(program, [phase, signal]);
            amplifier.resume()?.ok_or(ChainError::NoSignal(ix))
        })
}

fn run_feedback(program: &[Value], phases: &[Value]) -> Result<Value, ChainError> {
    let mut amplifiers = phases
        .iter()
        .map(|&phase| Machine::with_inputs(program, [phase]))
        .collect::<Vec<_>>();
    let mut signal = 0;
    loop {
        for amplifier in &mut amplifiers {
            amplifier.push_input(signal);
            match amplifier.resume()? {
                Some(value) => signal = value,
                None => return Ok(signal),
            }
        }
    }
}

fn best_signal(
    program: &[Value],
    phases: std::ops::Range<Value>,
    run: fn(&[Value], &[Value]) -> Result<Value, ChainError>,
) -> Value {
    phases
        .permutations(5)
        .map(|order| run(program, &order).unwrap())
        .max()
        .unwrap()
}

const EXAMPLE1: &str = "3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0";
const EXAMPLE2: &str = "\
    3,23,3,24,1002,24,10,24,1002,23,-1,23,\
    101,5,23,23,1,24,23,23,4,23,99,0,0\
";
const EXAMPLE3: &str = "\
    3,31,3,32,1002,32,10,32,1001,31,-2,31,1007,31,0,33,\
    1002,33,7,33,1,33,31,31,1,32,31,31,4,31,99,0,0,0\
";
const EXAMPLE4: &str = "\
    3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,\
    27,4,27,1001,28,-1,28,1005,28,6,99,0,0,5\
";
const EXAMPLE5: &str = "\
    3,52,1001,52,-5,52,3,53,1,52,56,54,1007,54,5,55,1005,55,26,1001,54,\
    -5,54,1105,1,12,1,53,54,53,1008,54,0,55,1001,55,1,55,2,53,55,53,4,\
    53,1001,56,-1,56,1005,56,6,99,0,0,0,0,10\
";

#[test_case(EXAMPLE1, &[4, 3, 2, 1, 0] => 43_210)]
#[test_case(EXAMPLE2, &[0, 1, 2, 3, 4] => 54_321)]
#[test_case(EXAMPLE3, &[1, 0, 4, 3, 2] => 65_210)]
fn test_series(input: &str, phases: &[Value]) -> Value {
    let program = parse_program(input).unwrap();
    run_series(&program, phases).unwrap()
}

#[test_case(EXAMPLE1 => 43_210)]
#[test_case(EXAMPLE2 => 54_321)]
#[test_case(EXAMPLE3 => 65_210)]
fn test_best_series(input: &str) -> Value {
    let program = parse_program(input).unwrap();
    best_signal(&program, 0..5, run_series)
}

#[test_case(EXAMPLE4, &[9, 8, 7, 6, 5] => 139_629_729)]
#[test_case(EXAMPLE5, &[9, 7, 8, 5, 6] => 18_216)]
fn test_feedback(input: &str, phases: &[Value]) -> Value {
    log_init();
    let program = parse_program(input).unwrap();
    run_feedback(&program, phases).unwrap()
}

#[test_case(EXAMPLE4 => 139_629_729)]
#[test_case(EXAMPLE5 => 18_216)]
fn test_best_feedback(input: &str) -> Value {
    let program = parse_program(input).unwrap();
    best_signal(&program, 5..10, run_feedback)
}

#[test]
fn test_missing_signal() {
    let err = run_series(&[99], &[0]).unwrap_err();
    assert!(matches!(err, ChainError::NoSignal(0)));
}

// Two endless loops passing a value back and forth, one doubling it and one
// incrementing it. Neither is fed in lock-step; each is polled round-robin
// and simply reports when it is waiting.
#[test]
fn test_round_robin() {
    log_init();
    let doubler = [3, 100, 1002, 100, 2, 100, 4, 100, 1105, 1, 0];
    let incrementer = [3, 100, 1001, 100, 1, 100, 4, 100, 1105, 1, 0];
    let mut nodes = [Machine::new(&doubler), Machine::new(&incrementer)];
    nodes[0].push_input(1);

    let mut history = Vec::new();
    let last = 'outer: loop {
        for ix in 0..nodes.len() {
            match nodes[ix].poll().unwrap() {
                Yield::Output(value) => {
                    history.push(value);
                    if value > 1_000 {
                        break 'outer value;
                    }
                    nodes[(ix + 1) % nodes.len()].push_input(value);
                }
                Yield::AwaitingInput => {}
                Yield::Halted => panic!("node {ix} halted"),
            }
        }
    };

    assert_eq!(last, 1_022);
    assert_eq!(&history[..6], [2, 3, 6, 7, 14, 15]);
    assert!(nodes.iter().all(|node| node.memory().len() == 101));
}
