//! Built-in problem bank. Guarantees every round has content even without a TOML bank.

use crate::domain::{ProblemRecord, Round};

macro_rules! problem {
  ($id:expr, $year:expr, $round:expr, $number:expr, $statement:expr, $answer:expr, $solution:expr, $secs:expr, $difficulty:expr, [$($topic:expr),+ $(,)?]) => {
    ProblemRecord {
      id: $id.into(),
      year: $year,
      round: $round,
      number: $number,
      statement: $statement.into(),
      answer: $answer.into(),
      short_solution: $solution.into(),
      estimated_solve_time_sec: $secs,
      difficulty: $difficulty,
      topics: vec![$($topic.into()),+],
    }
  };
}

pub fn seed_problems() -> Vec<ProblemRecord> {
  use Round::*;
  vec![
    problem!("A1-2022-1", 2022, Algebra1, 1, r"Solve for \(x\): \(3x+5=20\).", "5", "Subtract 5, then divide by 3.", 20, 1, ["linear equations"]),
    problem!("A1-2023-4", 2023, Algebra1, 4, r"If \(2x-7=11\), find \(x\).", "9", "Add 7 to get 18, divide by 2.", 20, 1, ["linear equations"]),
    problem!("A1-2021-9", 2021, Algebra1, 9, r"Factor: \(x^2-9\). Enter as \((x-a)(x+b)\) format.", "(x-3)(x+3)", "Difference of squares.", 35, 3, ["factoring"]),
    problem!("A2-2023-3", 2023, Algebra2, 3, r"If \(x^2-5x+6=0\), what is the larger root?", "3", r"Factor into \((x-2)(x-3)=0\).", 40, 2, ["quadratics"]),
    problem!("A2-2022-8", 2022, Algebra2, 8, r"Compute \(\sum_{k=1}^{5} k\).", "15", "1+2+3+4+5=15.", 15, 1, ["series"]),
    problem!("A2-2021-14", 2021, Algebra2, 14, r"If \(\log_2 x=5\), find \(x\).", "32", r"Rewrite as \(x=2^5\).", 25, 3, ["logarithms"]),
    problem!("S-2022-2", 2022, Statistics, 2, "Find the mean of 2, 4, 6, 8.", "5", "Sum is 20 over 4 values.", 20, 1, ["mean"]),
    problem!("S-2023-10", 2023, Statistics, 10, "Data set: 1, 2, 2, 3, 10. Median?", "2", "Middle value is 2.", 20, 2, ["median"]),
    problem!("S-2021-13", 2021, Statistics, 13, "A fair die is rolled once. Probability of getting at most 4?", "2/3", "Outcomes 1,2,3,4 are 4 of 6.", 30, 3, ["probability"]),
    problem!("G-2023-1", 2023, Geometry, 1, "Area of a triangle with base 10 and height 6?", "30", r"\(\tfrac12 bh=30\).", 20, 1, ["area"]),
    problem!("G-2022-7", 2022, Geometry, 7, r"Circumference of a circle with radius 4. Use \(\pi\).", "8pi", r"\(C=2\pi r=8\pi\).", 20, 2, ["circle"]),
    problem!("G-2021-16", 2021, Geometry, 16, "A right triangle has legs 5 and 12. Hypotenuse?", "13", "Use Pythagorean triple 5-12-13.", 30, 3, ["pythagorean theorem"]),
    problem!("C-2023-2", 2023, Calculus, 2, r"Compute \(\frac{d}{dx}(x^3)\).", "3x^2", "Power rule.", 20, 2, ["derivative"]),
    problem!("C-2022-11", 2022, Calculus, 11, r"Compute \(\int 2x\,dx\).", "x^2+C", r"Antiderivative of \(2x\) is \(x^2\).", 25, 3, ["integral"]),
    problem!("C-2021-18", 2021, Calculus, 18, r"If \(f(x)=x^2\), find \(f'(3)\).", "6", r"\(f'(x)=2x\), then evaluate at 3.", 25, 3, ["derivative"]),
    problem!("PC-2023-5", 2023, PreCalculus, 5, r"Find \(\sin(30^\circ)\).", "1/2", "Special angle value.", 15, 1, ["trigonometry"]),
    problem!("PC-2022-12", 2022, PreCalculus, 12, r"Find \(\cos(60^\circ)\).", "1/2", "Special angle value.", 15, 1, ["trigonometry"]),
    problem!("PC-2021-20", 2021, PreCalculus, 20, r"Solve \(2^x=16\).", "4", r"\(16=2^4\).", 20, 2, ["exponential"]),
  ]
}
