use linfa::prelude::*;
use lowrank_gp::metrics::{relative_frobenius_error, rmse};
use lowrank_gp::{
    GaussianProcess, GpSurrogate, Inducings, Kernel, RffGaussianProcess, SparseGaussianProcess,
};
use ndarray::{Array, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use std::time::Instant;

fn main() {
    env_logger::init();

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let nt = 1000;
    let xt = Array::random_using((nt, 1), Uniform::new(-5., 5.), &mut rng);
    let noise = Array::random_using(nt, Normal::new(0., 0.1).unwrap(), &mut rng);
    let yt = xt.column(0).mapv(f64::sin) + noise;
    let dataset = Dataset::new(xt, yt);

    let kernel = Kernel::rbf(1.);
    let now = Instant::now();
    let exact = GaussianProcess::params(kernel.clone())
        .noise_variance(0.01)
        .fit(&dataset)
        .expect("GP fitting");
    println!("Exact GP fitted in {:?}", now.elapsed());
    let now = Instant::now();
    let nystrom = SparseGaussianProcess::params(kernel.clone(), Inducings::Randomized(50))
        .noise_variance(0.01)
        .seed(Some(42))
        .fit(&dataset)
        .expect("SGP fitting");
    println!("Nystrom GP fitted in {:?}", now.elapsed());
    let now = Instant::now();
    let rff = RffGaussianProcess::params(kernel, 50)
        .noise_variance(0.01)
        .seed(Some(42))
        .fit(&dataset)
        .expect("RFF GP fitting");
    println!("RFF GP fitted in {:?}", now.elapsed());
    println!("{exact}\n{nystrom}\n{rff}");

    let xtest = Array::linspace(-4.5, 4.5, 200).insert_axis(Axis(1));
    let ytest = xtest.column(0).mapv(f64::sin);
    let exact_mean = exact.predict(&xtest).expect("GP prediction");
    let exact_gram = exact.compute_kernel(&xtest).expect("Gram matrix");

    let models: [(&str, &dyn GpSurrogate<f64>); 3] =
        [("exact", &exact), ("nystrom", &nystrom), ("rff", &rff)];
    println!("model     rmse(truth)  rmse(exact)  gram error");
    for (name, model) in models {
        let (mean, _) = model.predict_valvar(&xtest.view()).expect("Prediction");
        let gram = model.compute_kernel(&xtest.view()).expect("Gram matrix");
        println!(
            "{name:<9} {:<12.4e} {:<12.4e} {:.4e}",
            rmse(&mean, &ytest).expect("RMSE"),
            rmse(&mean, &exact_mean).expect("RMSE"),
            relative_frobenius_error(&gram, &exact_gram).expect("Frobenius error")
        );
    }
}
