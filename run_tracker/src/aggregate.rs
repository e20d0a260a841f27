use run_tracker_lib::{coordinate::Coordinate, polyline, position_fix::PositionFix, session::Session, snapshot::Snapshot};

/// What happened to a fix's coordinate when it was folded into the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathStep {
    /// First point of the session
    Started,
    /// Appended, carrying the given distance in meters
    Extended(f64),
    /// Implausible jump of the given length, left out of the path
    Glitch(f64),
}

/// In-memory running totals of the active session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunningAggregate {
    pub start_time: i64,
    /// Sum of all completed pauses, in milliseconds
    pub paused_total: i64,
    pub paused_at: Option<i64>,
    /// Reference point for the next distance check: the tail of the path
    pub last_coordinate: Option<Coordinate>,
    pub path: Vec<Coordinate>,
    pub distance: f64,
    pub speed_sum: f64,
    pub speed_count: u32,
    pub max_speed: f64,
    pub current_speed: f64,
    pub current_location: Option<Coordinate>,
    pub accuracy: f64,
}

impl RunningAggregate {
    pub fn new(start_time: i64) -> Self {
        Self {
            start_time,
            ..Default::default()
        }
    }

    /// Rebuilds totals from the last checkpoint of `session`.
    ///
    /// The path comes from the checkpointed encoding, not from replaying raw points.
    /// Speed history is not stored, so the sum is approximated as the persisted average
    /// times the number of raw points. The paused total is chosen so the duration at
    /// `now` equals the checkpointed duration; downtime before recovery does not count.
    pub fn restore(session: &Session, raw_point_count: usize, now: i64) -> Result<Self, polyline::PolylineError> {
        let path = polyline::decode(&session.encoded_path)?;
        let last_coordinate = path.last().copied();

        Ok(Self {
            start_time: session.start_time,
            paused_total: (now - session.start_time - session.duration).max(0),
            paused_at: None,
            last_coordinate,
            path,
            distance: session.distance,
            speed_sum: session.avg_speed * raw_point_count as f64,
            speed_count: u32::try_from(raw_point_count).unwrap_or(u32::MAX),
            max_speed: session.max_speed,
            current_speed: 0.,
            current_location: last_coordinate,
            accuracy: 0.,
        })
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Elapsed time excluding pauses. Frozen at the pause start while paused.
    pub fn duration_at(&self, now: i64) -> i64 {
        let end = self.paused_at.unwrap_or(now);
        (end - self.start_time - self.paused_total).max(0)
    }

    pub fn average_speed(&self) -> f64 {
        if self.speed_count > 0 {
            self.speed_sum / self.speed_count as f64
        } else {
            0.
        }
    }

    pub fn pause(&mut self, now: i64) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: i64) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += (now - paused_at).max(0);
        }
    }

    /// Folds an accepted fix into the totals.
    ///
    /// Glitches are kept out of the path and the distance and do not move the
    /// reference point, but their speed still counts.
    pub fn record_fix(&mut self, fix: &PositionFix, glitch_threshold: f64) -> PathStep {
        let coordinate = fix.coordinate();

        let step = match self.last_coordinate {
            Some(last) => {
                let distance = last.distance_to(&coordinate);
                if distance > glitch_threshold {
                    PathStep::Glitch(distance)
                } else {
                    self.distance += distance;
                    self.path.push(coordinate);
                    self.last_coordinate = Some(coordinate);
                    PathStep::Extended(distance)
                }
            }
            None => {
                self.path.push(coordinate);
                self.last_coordinate = Some(coordinate);
                PathStep::Started
            }
        };

        if fix.speed > self.max_speed {
            self.max_speed = fix.speed;
        }
        self.speed_sum += fix.speed;
        self.speed_count += 1;

        self.current_speed = fix.speed;
        self.current_location = Some(coordinate);
        self.accuracy = fix.accuracy;

        step
    }

    pub fn snapshot(&self, session_id: &str, now: i64) -> Snapshot {
        Snapshot {
            tracking: true,
            paused: self.is_paused(),
            current_speed: self.current_speed,
            distance: self.distance,
            duration: self.duration_at(now),
            avg_speed: self.average_speed(),
            max_speed: self.max_speed,
            path: self.path.clone(),
            current_location: self.current_location,
            accuracy: self.accuracy,
            session_id: Some(session_id.to_string()),
        }
    }

    /// `session` with the checkpointed totals at `now`. Lifecycle fields are left alone.
    pub fn checkpoint_of(&self, session: &Session, now: i64) -> Session {
        Session {
            duration: self.duration_at(now),
            distance: self.distance,
            avg_speed: self.average_speed(),
            max_speed: self.max_speed,
            encoded_path: polyline::encode(&self.path),
            ..session.clone()
        }
    }
}
