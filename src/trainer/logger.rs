use std::{
    fmt::Debug,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Everything measured during one training iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// Zero based.
    pub iteration: usize,
    /// Mean summed squared error over the training samples, when tracked.
    pub cost: Option<f32>,
    /// Fraction of training samples classified correctly, when checked.
    pub train_accuracy: Option<f32>,
    pub test_accuracy: Option<f32>,
    /// Learning rate in effect at the end of the iteration.
    pub rate: f32,
    pub seconds: f64,
}

/// Receives a record after every training iteration.
pub trait Logger: Debug + Send {
    fn iteration(&mut self, record: &IterationRecord);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockLogger;

impl Logger for MockLogger {
    fn iteration(&mut self, _record: &IterationRecord) {}
}

/// Appends one whitespace separated line per iteration:
/// `iteration cost train_accuracy test_accuracy rate seconds`, `-` for missing values.
#[derive(Debug)]
pub struct LogFile {
    file: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            file: path.as_ref().to_owned(),
            writer: BufWriter::new(File::create(path)?),
        })
    }

    fn write_record(&mut self, record: &IterationRecord) -> io::Result<()> {
        let opt = |v: Option<f32>| v.map_or_else(|| "-".to_owned(), |v| v.to_string());
        writeln!(
            self.writer,
            "{} {} {} {} {} {}",
            record.iteration,
            opt(record.cost),
            opt(record.train_accuracy),
            opt(record.test_accuracy),
            record.rate,
            record.seconds
        )?;
        self.writer.flush()
    }
}

impl Logger for LogFile {
    fn iteration(&mut self, record: &IterationRecord) {
        if let Err(e) = self.write_record(record) {
            eprintln!(
                "Error while logging iteration to file: {}\nError: {}",
                self.file.display(),
                e
            );
        }
    }
}
