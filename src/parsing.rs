use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
    str::FromStr,
};

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;

use log::warn;

use crate::{
    errors::{Error, ParsingError},
    header::{is_coordinate_system, is_number_of_points, is_scenario_epoch, Header},
    sample::OrbitSample,
    segment::OrbitSegment,
    Satellite, Vector3D,
};

fn begin_segment_boundaries(line: &str) -> bool {
    line.contains("BEGIN SegmentBoundaryTimes")
}

fn end_segment_boundaries(line: &str) -> bool {
    line.contains("END SegmentBoundaryTimes")
}

fn begin_state_vectors(line: &str) -> bool {
    line.contains("EphemerisTimePosVel")
}

fn end_state_vectors(line: &str) -> bool {
    line.contains("END Ephemeris")
}

/// Parses one `t px py pz vx vy vz` row; `t` is seconds since the
/// scenario epoch.
fn parse_state_vector(line: &str, epoch_unix_s: f64) -> Result<OrbitSample, ParsingError> {
    let mut fields = [0.0_f64; 7];
    let mut count = 0;

    for (slot, field) in fields.iter_mut().zip(line.split_whitespace()) {
        *slot = f64::from_str(field)
            .or(Err(ParsingError::MalformedStateVector(line.to_string())))?;
        count += 1;
    }

    if count < 7 {
        return Err(ParsingError::MalformedStateVector(line.to_string()));
    }

    Ok(OrbitSample::new(
        epoch_unix_s + fields[0],
        Vector3D::new(fields[1], fields[2], fields[3]),
        Vector3D::new(fields[4], fields[5], fields[6]),
    ))
}

/// Per-file parsing state: collects samples into segments as boundary
/// times are crossed.
struct SegmentBuilder {
    boundaries: Vec<f64>,
    last_boundary: f64,
    pending: Vec<OrbitSample>,
    segments: Vec<OrbitSegment>,
}

impl SegmentBuilder {
    fn new(epoch_unix_s: f64) -> Self {
        Self {
            boundaries: Vec::new(),
            last_boundary: epoch_unix_s,
            pending: Vec::new(),
            segments: Vec::new(),
        }
    }

    /// A row lying on a fresh boundary closes the current segment (the
    /// row included). The repeated boundary row that follows belongs to
    /// the next segment, which is what gives boundary epochs their
    /// "later segment wins" residency.
    fn push(&mut self, sample: OrbitSample) {
        let time_s = sample.time_s;
        self.pending.push(sample);

        if self.boundaries.contains(&time_s) && self.last_boundary != time_s {
            self.last_boundary = time_s;
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let samples = std::mem::take(&mut self.pending);

        if let Some(previous) = self.segments.last() {
            if samples[0].time_s < previous.end_time_s {
                warn!(
                    "discarding segment starting {}: overlaps previous segment ending {}",
                    samples[0].time_s, previous.end_time_s,
                );
                return;
            }
        }

        let segment_id = self.segments.len() as u64;
        self.segments
            .push(OrbitSegment::from_samples(segment_id, 0, samples));
    }
}

impl Satellite {
    /// Parses a [Satellite] from a local ephemeris file. The platform
    /// name is the file stem; the platform id is assigned when the
    /// satellite enters an ephemeris store.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let name = platform_name(&path);
        let fd = File::open(&path)?;
        let mut reader = BufReader::new(fd);
        Self::from_reader(&mut reader, &name)
    }

    /// Parses a [Satellite] from a gzip compressed local ephemeris file.
    #[cfg(feature = "flate2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "flate2")))]
    pub fn from_gzip_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let name = platform_name(&path);
        let fd = File::open(&path)?;
        let fd = GzDecoder::new(fd);
        let mut reader = BufReader::new(fd);
        Self::from_reader(&mut reader, &name)
    }

    /// Parses ephemeris data from any [Read]able I/O.
    pub fn from_reader<R: Read>(
        reader: &mut BufReader<R>,
        platform_name: &str,
    ) -> Result<Self, Error> {
        let mut header = Header::default();
        let mut epoch_unix_s = Option::<f64>::None;

        let mut builder = Option::<SegmentBuilder>::None;
        let mut reading_boundaries = false;
        let mut reading_states = false;

        let mut maximum_altitude_m = 0.0_f64;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if is_scenario_epoch(line) {
                header.parse_scenario_epoch(line)?;
                epoch_unix_s = Some(header.scenario_epoch_unix_s);
                continue;
            }

            if is_coordinate_system(line) {
                header.parse_coordinate_system(line);
                continue;
            }

            if is_number_of_points(line) {
                header.parse_number_of_points(line);
                continue;
            }

            if end_segment_boundaries(line) {
                reading_boundaries = false;
                continue;
            }

            if begin_segment_boundaries(line) {
                let epoch = epoch_unix_s.ok_or(ParsingError::MissingScenarioEpoch)?;
                builder.get_or_insert_with(|| SegmentBuilder::new(epoch));
                reading_boundaries = true;
                continue;
            }

            if reading_boundaries && !line.is_empty() {
                let epoch = epoch_unix_s.ok_or(ParsingError::MissingScenarioEpoch)?;
                let offset = f64::from_str(line)
                    .or(Err(ParsingError::MalformedSegmentBoundary(line.to_string())))?;

                if let Some(builder) = builder.as_mut() {
                    builder.boundaries.push(epoch + offset);
                }
                continue;
            }

            if end_state_vectors(line) {
                reading_states = false;
                if let Some(builder) = builder.as_mut() {
                    builder.flush();
                }
                continue;
            }

            if begin_state_vectors(line) {
                let epoch = epoch_unix_s.ok_or(ParsingError::MissingScenarioEpoch)?;
                builder.get_or_insert_with(|| SegmentBuilder::new(epoch));
                reading_states = true;
                continue;
            }

            if reading_states && !line.is_empty() {
                let epoch = epoch_unix_s.ok_or(ParsingError::MissingScenarioEpoch)?;
                let sample = parse_state_vector(line, epoch)?;

                maximum_altitude_m = maximum_altitude_m.max(sample.geocentric_distance_m());

                if let Some(builder) = builder.as_mut() {
                    builder.push(sample);
                }
            }
        }

        let mut builder = builder.ok_or(ParsingError::EmptyEphemeris)?;
        builder.flush();

        if builder.segments.is_empty() {
            return Err(ParsingError::EmptyEphemeris.into());
        }

        Ok(Satellite {
            platform_id: 0,
            platform_name: platform_name.to_string(),
            maximum_altitude_m,
            header,
            segments: builder.segments,
        })
    }
}

fn platform_name(path: &impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
