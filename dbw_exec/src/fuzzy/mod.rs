//! # Fuzzy acceleration controller
//!
//! Mamdani controller with two inputs, the predicted acceleration error and the
//! velocity error, and one output, the change in pedal demand. Both inputs and
//! the output are split into five triangular classes, symmetric about zero.
//! Rules combine with `min`, classes aggregate with `max` and the output is
//! the centroid of the capped output triangles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod rule_base;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use rule_base::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Breakpoints from which the five classes of a variable are built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoints {
    /// Peak of the large classes.
    pub ll: f64,
    /// Inner foot of the large classes.
    pub ls: f64,
    /// Outer foot of the small classes.
    pub sl: f64,
    /// Peak of the small classes.
    pub ss: f64,
    /// Half width of the zero class.
    pub ze: f64,
}

/// Triangular membership function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Triangle {
    pub left: f64,
    pub peak: f64,
    pub right: f64,
}

/// The five classes of one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembershipSet {
    triangles: [Triangle; 5],
}

/// The acceleration controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyController {
    input_1: MembershipSet,
    input_2: MembershipSet,
    output: MembershipSet,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Linguistic class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Class {
    NegativeLarge,
    NegativeSmall,
    Zero,
    PositiveSmall,
    PositiveLarge,
}

// Short names used in the rule table.
pub use Class::{
    NegativeLarge as NL, NegativeSmall as NS, PositiveLarge as PL, PositiveSmall as PS,
    Zero as ZE,
};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Class {
    pub const ALL: [Class; 5] = [NL, NS, ZE, PS, PL];

    pub fn index(self) -> usize {
        match self {
            NL => 0,
            NS => 1,
            ZE => 2,
            PS => 3,
            PL => 4,
        }
    }

    /// The class on the other side of zero.
    pub fn mirror(self) -> Class {
        Class::ALL[4 - self.index()]
    }
}

impl Breakpoints {
    /// Multiply every breakpoint by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            ll: self.ll * factor,
            ls: self.ls * factor,
            sl: self.sl * factor,
            ss: self.ss * factor,
            ze: self.ze * factor,
        }
    }
}

impl Triangle {
    pub fn new(left: f64, peak: f64, right: f64) -> Self {
        Self { left, peak, right }
    }

    /// Degree of membership of `x`, in [0, 1].
    pub fn weight(&self, x: f64) -> f64 {
        if x < self.left || x > self.right {
            0.0
        } else if x < self.peak {
            (x - self.left) / (self.peak - self.left)
        } else {
            1.0 + (x - self.peak) / (self.peak - self.right)
        }
    }

    /// Degree of membership of `x` with the triangle cut off at `cap`. A zero
    /// cap removes the triangle altogether.
    pub fn capped_weight(&self, x: f64, cap: f64) -> f64 {
        if cap == 0.0 {
            return 0.0;
        }

        self.weight(x).min(cap)
    }

    /// True if `x` lies strictly between the feet.
    pub fn contains_strict(&self, x: f64) -> bool {
        x > self.left && x < self.right
    }
}

impl MembershipSet {
    /// Build the five classes from their breakpoints.
    pub fn from_breakpoints(b: &Breakpoints) -> Self {
        Self {
            triangles: [
                Triangle::new(-OUTER_LIMIT, -b.ll, -b.ls),
                Triangle::new(-b.sl, -b.ss, 0.0),
                Triangle::new(-b.ze, 0.0, b.ze),
                Triangle::new(0.0, b.ss, b.sl),
                Triangle::new(b.ls, b.ll, OUTER_LIMIT),
            ],
        }
    }

    pub fn triangle(&self, class: Class) -> &Triangle {
        &self.triangles[class.index()]
    }
}

impl FuzzyController {
    pub fn new(input_1: MembershipSet, input_2: MembershipSet, output: MembershipSet) -> Self {
        Self {
            input_1,
            input_2,
            output,
        }
    }

    /// Evaluate every rule and return the strength of each output class,
    /// indexed by [`Class::index`].
    pub fn class_strengths(&self, x1: f64, x2: f64) -> [f64; 5] {
        let mut strengths = [0.0f64; 5];

        for &c1 in Class::ALL.iter() {
            let t1 = self.input_1.triangle(c1);
            if !t1.contains_strict(x1) {
                continue;
            }

            for &c2 in Class::ALL.iter() {
                let t2 = self.input_2.triangle(c2);
                if !t2.contains_strict(x2) {
                    continue;
                }

                let cell = t1.weight(x1).min(t2.weight(x2));
                let out = RULES[c1.index()][c2.index()].index();
                strengths[out] = strengths[out].max(cell);
            }
        }

        strengths
    }

    /// Run the controller. Returns `None` if no output class has any
    /// strength, in which case the output is undefined.
    pub fn infer(&self, x1: f64, x2: f64) -> Option<f64> {
        let strengths = self.class_strengths(x1, x2);

        let step = (OUTPUT_MAX - OUTPUT_MIN) / OUTPUT_RESOLUTION as f64;
        let mut moment = 0.0;
        let mut area = 0.0;

        for i in 0..=OUTPUT_RESOLUTION {
            let x = OUTPUT_MIN + i as f64 * step;

            let y = Class::ALL
                .iter()
                .map(|&c| self.output.triangle(c).capped_weight(x, strengths[c.index()]))
                .fold(0.0, f64::max);

            moment += y * x;
            area += y;
        }

        if area == 0.0 {
            trace!("Fuzzy output undefined for ({}, {})", x1, x2);
            return None;
        }

        Some(moment / area)
    }
}

impl Default for FuzzyController {
    fn default() -> Self {
        Self::new(
            MembershipSet::from_breakpoints(&INPUT_1),
            MembershipSet::from_breakpoints(&INPUT_2.scaled(VELOCITY_SCALE)),
            MembershipSet::from_breakpoints(&OUTPUT),
        )
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run the acceleration controller, giving no correction when its output is
/// undefined.
pub fn fuzzy_acc_ctl(x1: f64, x2: f64) -> f64 {
    FuzzyController::default().infer(x1, x2).unwrap_or(0.0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_triangle_weight() {
        let t = Triangle::new(0.0, 2.5, 3.33);

        assert_eq!(t.weight(-0.1), 0.0);
        assert_eq!(t.weight(0.0), 0.0);
        assert!((t.weight(1.25) - 0.5).abs() < 1e-12);
        assert_eq!(t.weight(2.5), 1.0);
        assert!(t.weight(3.33).abs() < 1e-12);
        assert_eq!(t.weight(4.0), 0.0);

        assert_eq!(t.capped_weight(2.5, 0.3), 0.3);
        assert_eq!(t.capped_weight(2.5, 0.0), 0.0);
    }

    #[test]
    fn test_rule_table_is_symmetric() {
        for &c1 in Class::ALL.iter() {
            for &c2 in Class::ALL.iter() {
                assert_eq!(
                    RULES[c1.index()][c2.index()].mirror(),
                    RULES[c1.mirror().index()][c2.mirror().index()]
                );
            }
        }
    }

    #[test]
    fn test_zero_at_origin() {
        let out = FuzzyController::default().infer(0.0, 0.0).unwrap();
        assert!(out.abs() < 1e-9);
    }

    #[test]
    fn test_output_is_odd() {
        let ctrl = FuzzyController::default();

        // Acceleration error over [-5, 5], velocity error over [-100, 100]
        for i in -100..=100 {
            for j in -100..=100 {
                let x1 = i as f64 * 0.05;
                let x2 = j as f64 * 1.0;

                let pos = ctrl.infer(x1, x2);
                let neg = ctrl.infer(-x1, -x2);

                match (pos, neg) {
                    (Some(p), Some(n)) => {
                        assert!((p + n).abs() < 1e-9, "f({}, {}) = {}, f(-x) = {}", x1, x2, p, n)
                    }
                    (None, None) => (),
                    _ => panic!("f({}, {}) defined on one side only", x1, x2),
                }
            }
        }
    }

    #[test]
    fn test_positive_velocity_error_raises_demand() {
        assert!(fuzzy_acc_ctl(0.0, 5.0) > 0.0);
        assert!(fuzzy_acc_ctl(0.0, -5.0) < 0.0);
    }

    #[test]
    fn test_undefined_gives_no_correction() {
        // Beyond the outer feet no rule fires.
        let ctrl = FuzzyController::default();
        assert_eq!(ctrl.infer(150.0, 0.0), None);
        assert_eq!(fuzzy_acc_ctl(150.0, 0.0), 0.0);
    }

    #[test]
    fn test_rules_need_strictly_inside() {
        let ctrl = FuzzyController::default();

        // Exactly on the right foot of input 1 ZE and left foot of PS.
        let x1 = INPUT_1.ze;
        let strengths = ctrl.class_strengths(x1, 0.0);

        // Only the PS row fires, its PS.ZE cell maps to NS.
        assert_eq!(strengths[ZE.index()], 0.0);
        assert!(strengths[NS.index()] > 0.0);
    }
}
