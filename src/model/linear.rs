//! Ordinary least squares through linfa-linear

use super::{check_columns, check_training_data, not_fitted, ModelKind, Regressor};
use crate::{Result, TransferError};
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, ArrayView1, ArrayView2};

#[derive(Debug, Clone)]
pub struct LinearModel {
    fit_intercept: bool,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(fit_intercept: bool) -> Self {
        LinearModel {
            fit_intercept,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

impl Regressor for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearRegression
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let dataset = Dataset::new(x.to_owned(), y.to_owned());
        let fitted = LinearRegression::new()
            .with_intercept(self.fit_intercept)
            .fit(&dataset)
            .map_err(|e| TransferError::Model(format!("least squares fit failed: {}", e)))?;

        let coefficients = fitted.params().to_owned();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(TransferError::Model(
                "least squares produced non-finite coefficients; features may be collinear"
                    .to_string(),
            ));
        }

        self.intercept = fitted.intercept();
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| not_fitted(self.kind()))?;
        check_columns(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn feature_weights(&self) -> Option<Array1<f64>> {
        self.coefficients.clone()
    }
}
