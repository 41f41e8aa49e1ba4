//! Randomized properties of the interpolation machinery.

use dfo::model::omega_product;
use dfo::{Options, Problem, TrustRegion};
use nalgebra::DVector;
use proptest::prelude::*;

type Vector = DVector<f64>;

fn sphere_state() -> TrustRegion {
    let problem = Problem::new(|x: &Vector| x.norm_squared(), &[1.0, 1.0]);
    TrustRegion::new(problem, &Options::default()).unwrap()
}

proptest! {
    #[test]
    fn interpolants_of_random_values_interpolate(
        raw in proptest::collection::vec(-10.0_f64..10.0, 5)
    ) {
        let state = sphere_state();
        let models = state.models();
        let fval = Vector::from_vec(raw);
        let q = models.new_model(&fval);
        let xpt = models.set().xpt();
        let kopt = models.kopt();
        let fmax = fval.amax().max(1.0);
        let tol = 10.0 * f64::EPSILON.sqrt() * 5.0 * fmax;
        for k in 0..5 {
            let qx = q.value(&xpt.row(k).transpose(), xpt, kopt);
            prop_assert!(
                (qx + fval[kopt] - fval[k]).abs() <= tol,
                "point {}: model {} against value {}",
                k,
                qx + fval[kopt],
                fval[k]
            );
        }
    }

    #[test]
    fn swap_update_composed_with_its_inverse_is_identity(
        dx in -0.4_f64..0.4,
        // Kept away from the axis so that the perturbed set stays poised.
        dy in 0.05_f64..0.4,
    ) {
        let state = sphere_state();
        let kopt = state.kopt();
        let knew = (kopt + 1) % 5;
        let reference = state.models().kkt().clone();
        let mut kkt = reference.clone();
        let mut xpt = state.models().set().xpt().clone();
        let xopt = xpt.row(kopt).transpose();
        let xold = xpt.row(knew).transpose();

        // Insert the trial point, then put the original point back.
        let step = Vector::from_column_slice(&[dx, dy]);
        let (beta, mut vlag) = kkt.lagrange_values(&xpt, kopt, &step);
        kkt.update(knew, beta, &mut vlag).unwrap();
        let xnew = &xopt + &step;
        xpt.row_mut(knew).copy_from(&xnew.transpose());
        let back = &xold - &xopt;
        let (beta, mut vlag) = kkt.lagrange_values(&xpt, kopt, &back);
        kkt.update(knew, beta, &mut vlag).unwrap();

        // The represented inverse KKT matrix is restored: its last columns
        // directly, its leading block through its action on a basis.
        let scale = reference.bmat().amax().max(1.0);
        let db = (kkt.bmat() - reference.bmat()).amax();
        prop_assert!(db <= 1e-8 * scale, "bmat drifted by {}", db);
        for k in 0..5 {
            let mut e = Vector::zeros(5);
            e[k] = 1.0;
            let before = omega_product(reference.zmat(), reference.idz(), &e);
            let after = omega_product(kkt.zmat(), kkt.idz(), &e);
            let dz = (&after - &before).amax();
            let zscale = before.amax().max(1.0);
            prop_assert!(dz <= 1e-8 * zscale, "omega action drifted by {}", dz);
        }
    }
}

#[test]
fn origin_shift_composed_with_its_inverse_is_identity() {
    let state = sphere_state();
    let kopt = state.kopt();
    let reference = state.models().kkt().clone();
    let mut kkt = reference.clone();
    let mut xpt = state.models().set().xpt().clone();
    let xopt = xpt.row(kopt).transpose();
    assert!(xopt.norm() > 0.0, "the incumbent must be away from the origin");

    // Shift the origin to the incumbent, translate the points, then shift
    // back through the interpolation point now sitting at the negated
    // displacement (the original origin).
    kkt.shift_origin(&xpt, kopt);
    for k in 0..xpt.nrows() {
        for i in 0..xpt.ncols() {
            xpt[(k, i)] -= xopt[i];
        }
    }
    let back = xpt.row(0).transpose();
    assert!((&back + &xopt).amax() < 1e-14, "row 0 must be the old origin");
    kkt.shift_origin(&xpt, 0);

    let scale = reference.bmat().amax().max(1.0);
    let db = (kkt.bmat() - reference.bmat()).amax();
    assert!(db <= 1e-8 * scale, "bmat drifted by {db}");
    let dz = (kkt.zmat() - reference.zmat()).amax();
    assert!(dz <= 1e-12, "zmat must be untouched by origin shifts");
    assert_eq!(kkt.idz(), reference.idz());
}
