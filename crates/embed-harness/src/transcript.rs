use crate::error::HarnessError;

/// Exact comparison, line terminators included.
pub fn assert_transcript(expected: &str, actual: &str) -> Result<(), HarnessError> {
    if expected == actual {
        return Ok(());
    }
    Err(HarnessError::TranscriptMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
        first_difference: first_difference(expected, actual),
    })
}

/// Human-readable position of the first diverging line.
pub fn first_difference(expected: &str, actual: &str) -> String {
    let mut exp = expected.split_inclusive('\n');
    let mut act = actual.split_inclusive('\n');
    let mut line = 1usize;
    loop {
        match (exp.next(), act.next()) {
            (Some(e), Some(a)) if e == a => line += 1,
            (Some(e), Some(a)) => return format!("line {line}: expected {e:?}, got {a:?}"),
            (Some(e), None) => return format!("line {line}: expected {e:?}, got end of output"),
            (None, Some(a)) => return format!("line {line}: unexpected extra output {a:?}"),
            (None, None) => return format!("line {line}: identical lines"),
        }
    }
}
