use super::{Amplitude, OscillationDetection};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Holds the tunables of the implicit (Newton) RVE equilibrium solver
///
/// The defaults reproduce the solver blocks of the original fiber-only
/// microscale analyses: a relative residual tolerance, an iteration budget,
/// and a bounded load cut-back schedule for diverging or oscillating solves.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Relative residual tolerance for Newton convergence
    pub solver_eps: f64,

    /// Absolute residual norm below which the solve is accepted outright
    pub zero_tol: f64,

    /// Maximum number of Newton iterations per load step
    pub max_itrs: usize,

    /// Maximum number of load cut-back attempts before a fatal failure
    pub max_cut_attempt: usize,

    /// Divisor applied to the load increment after a failed attempt
    pub attempt_cut_factor: f64,

    /// Scale factor (< 1) applied to the load increment after a detected oscillation
    pub prev_itr_factor: f64,

    /// Oscillation detection mode
    pub detect_osc_type: OscillationDetection,

    /// Prints iteration progress to stdout
    pub verbose: bool,
}

impl SolverConfig {
    /// Allocates a new instance with default tunables
    pub fn new() -> Self {
        SolverConfig {
            solver_eps: 1e-8,
            zero_tol: 1e-12,
            max_itrs: 30,
            max_cut_attempt: 4,
            attempt_cut_factor: 2.0,
            prev_itr_factor: 0.5,
            detect_osc_type: OscillationDetection::IterationPrevNorm,
            verbose: false,
        }
    }

    /// Sets the relative residual tolerance
    pub fn set_solver_eps(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 || value >= 1.0 {
            return Err("solver_eps must be in (0.0, 1.0)");
        }
        self.solver_eps = value;
        Ok(self)
    }

    /// Sets the maximum number of Newton iterations per load step
    pub fn set_max_itrs(&mut self, value: usize) -> Result<&mut Self, StrError> {
        if value < 1 {
            return Err("max_itrs must be ≥ 1");
        }
        self.max_itrs = value;
        Ok(self)
    }

    /// Sets the maximum number of load cut-back attempts
    pub fn set_max_cut_attempt(&mut self, value: usize) -> &mut Self {
        self.max_cut_attempt = value;
        self
    }

    /// Sets the divisor applied to the load increment after a failed attempt
    pub fn set_attempt_cut_factor(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 1.0 {
            return Err("attempt_cut_factor must be > 1.0");
        }
        self.attempt_cut_factor = value;
        Ok(self)
    }

    /// Sets the increment scale factor applied after a detected oscillation
    pub fn set_prev_itr_factor(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 || value >= 1.0 {
            return Err("prev_itr_factor must be in (0.0, 1.0)");
        }
        self.prev_itr_factor = value;
        Ok(self)
    }

    /// Sets the oscillation detection mode
    pub fn set_detect_osc_type(&mut self, value: OscillationDetection) -> &mut Self {
        self.detect_osc_type = value;
        self
    }

    /// Enables or disables iteration progress output
    pub fn set_verbose(&mut self, flag: bool) -> &mut Self {
        self.verbose = flag;
        self
    }

    /// Validates all parameters; returns a message for the first offending one
    pub fn validate(&self) -> Option<String> {
        if self.solver_eps <= 0.0 || self.solver_eps >= 1.0 {
            return Some(format!("solver_eps = {:?} is incorrect; it must be in (0.0, 1.0)", self.solver_eps));
        }
        if self.max_itrs < 1 {
            return Some(format!("max_itrs = {:?} is incorrect; it must be ≥ 1", self.max_itrs));
        }
        if self.attempt_cut_factor <= 1.0 {
            return Some(format!(
                "attempt_cut_factor = {:?} is incorrect; it must be > 1.0",
                self.attempt_cut_factor
            ));
        }
        if self.prev_itr_factor <= 0.0 || self.prev_itr_factor >= 1.0 {
            return Some(format!(
                "prev_itr_factor = {:?} is incorrect; it must be in (0.0, 1.0)",
                self.prev_itr_factor
            ));
        }
        None
    }
}

impl fmt::Display for SolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Implicit RVE solver\n===================\n").unwrap();
        write!(f, "solver_eps = {:?}\n", self.solver_eps).unwrap();
        write!(f, "max_itrs = {:?}\n", self.max_itrs).unwrap();
        write!(f, "max_cut_attempt = {:?}\n", self.max_cut_attempt).unwrap();
        write!(f, "attempt_cut_factor = {:?}\n", self.attempt_cut_factor).unwrap();
        write!(f, "prev_itr_factor = {:?}\n", self.prev_itr_factor).unwrap();
        write!(f, "detect_osc_type = {:?}\n", self.detect_osc_type).unwrap();
        Ok(())
    }
}

/// Holds the tunables of the explicit (dynamic relaxation) RVE solver
///
/// The explicit variant time-marches the fiber network with damping instead
/// of iterating Newton; it exists for networks whose tangent is prone to
/// instability. The energy-balance tolerance acts as the convergence proxy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExplicitConfig {
    /// Total marching time
    pub total_time: f64,

    /// Time over which the boundary displacement is ramped in
    pub load_time: f64,

    /// Mass-proportional viscous damping coefficient
    pub visc_damp_coeff: f64,

    /// Safety factor (≤ 1) applied to the critical time step estimate
    pub crit_time_scale_factor: f64,

    /// Relative energy-balance error accepted as "relaxed"
    pub energy_check_eps: f64,

    /// Fiber mass density used to lump nodal masses
    pub fiber_density: f64,

    /// Boundary displacement ramp profile
    pub amplitude: Amplitude,

    /// History log frequency in steps (0 disables)
    pub print_history_frequency: usize,
}

impl ExplicitConfig {
    /// Allocates a new instance with default tunables
    pub fn new() -> Self {
        ExplicitConfig {
            total_time: 10.0,
            load_time: 8.0,
            visc_damp_coeff: 0.8,
            crit_time_scale_factor: 0.9,
            energy_check_eps: 0.01,
            fiber_density: 1.0,
            amplitude: Amplitude::SmoothStep,
            print_history_frequency: 0,
        }
    }

    /// Validates all parameters; returns a message for the first offending one
    pub fn validate(&self) -> Option<String> {
        if self.total_time <= 0.0 {
            return Some(format!("total_time = {:?} is incorrect; it must be > 0.0", self.total_time));
        }
        if self.load_time <= 0.0 || self.load_time > self.total_time {
            return Some(format!(
                "load_time = {:?} is incorrect; it must be in (0.0, total_time]",
                self.load_time
            ));
        }
        if self.crit_time_scale_factor <= 0.0 || self.crit_time_scale_factor > 1.0 {
            return Some(format!(
                "crit_time_scale_factor = {:?} is incorrect; it must be in (0.0, 1.0]",
                self.crit_time_scale_factor
            ));
        }
        if self.energy_check_eps <= 0.0 {
            return Some(format!(
                "energy_check_eps = {:?} is incorrect; it must be > 0.0",
                self.energy_check_eps
            ));
        }
        if self.fiber_density <= 0.0 {
            return Some(format!(
                "fiber_density = {:?} is incorrect; it must be > 0.0",
                self.fiber_density
            ));
        }
        None
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{ExplicitConfig, SolverConfig};
    use crate::base::OscillationDetection;

    #[test]
    fn setters_capture_errors() {
        let mut config = SolverConfig::new();
        assert_eq!(config.set_solver_eps(0.0).err(), Some("solver_eps must be in (0.0, 1.0)"));
        assert_eq!(config.set_max_itrs(0).err(), Some("max_itrs must be ≥ 1"));
        assert_eq!(
            config.set_attempt_cut_factor(1.0).err(),
            Some("attempt_cut_factor must be > 1.0")
        );
        assert_eq!(
            config.set_prev_itr_factor(1.0).err(),
            Some("prev_itr_factor must be in (0.0, 1.0)")
        );
    }

    #[test]
    fn setters_and_validate_work() {
        let mut config = SolverConfig::new();
        config
            .set_solver_eps(1e-10)
            .unwrap()
            .set_max_itrs(50)
            .unwrap()
            .set_max_cut_attempt(2)
            .set_attempt_cut_factor(4.0)
            .unwrap()
            .set_prev_itr_factor(0.25)
            .unwrap()
            .set_detect_osc_type(OscillationDetection::PrevNorm)
            .set_verbose(false);
        assert_eq!(config.solver_eps, 1e-10);
        assert_eq!(config.max_itrs, 50);
        assert_eq!(config.max_cut_attempt, 2);
        assert_eq!(config.attempt_cut_factor, 4.0);
        assert_eq!(config.prev_itr_factor, 0.25);
        assert_eq!(config.validate(), None);

        let mut bad = SolverConfig::new();
        bad.max_itrs = 0;
        assert_eq!(bad.validate(), Some("max_itrs = 0 is incorrect; it must be ≥ 1".to_string()));
    }

    #[test]
    fn display_works() {
        let config = SolverConfig::new();
        let text = format!("{}", config);
        assert!(text.contains("solver_eps = 1e-8"));
        assert!(text.contains("max_cut_attempt = 4"));
    }

    #[test]
    fn explicit_validate_works() {
        let config = ExplicitConfig::new();
        assert_eq!(config.validate(), None);
        let mut bad = ExplicitConfig::new();
        bad.load_time = 20.0;
        assert!(bad.validate().unwrap().contains("load_time"));
        bad = ExplicitConfig::new();
        bad.fiber_density = 0.0;
        assert!(bad.validate().unwrap().contains("fiber_density"));
    }
}
