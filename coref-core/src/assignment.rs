//! # Emparelhamento Bipartido de Peso Máximo
//!
//! As métricas CEAF alinham cada cluster previsto a **no máximo um** cluster gold
//! (e vice-versa) maximizando a similaridade total. Esse é o problema de
//! atribuição, resolvido aqui pelo algoritmo Húngaro na forma de caminhos
//! aumentantes mais curtos com potenciais (Jonker-Volgenant), `O(n² · m)`.
//!
//! ## Intuição
//!
//! ```text
//!              pred_0  pred_1
//! gold_0    [   0.8,    0.6  ]
//! gold_1    [   0.7,    0.0  ]
//!
//! guloso:  gold_0→pred_0 (0.8) + gold_1→nada        = 0.8
//! ótimo:   gold_0→pred_1 (0.6) + gold_1→pred_0 (0.7) = 1.3
//! ```
//!
//! Maximizar a similaridade é minimizar o custo `-similaridade`.

/// Resolve a atribuição de peso máximo sobre uma matriz `[linhas][colunas]`.
///
/// Retorna pares `(linha, coluna)`; cada linha e cada coluna aparece no máximo uma vez,
/// e `min(linhas, colunas)` pares são devolvidos. Matrizes retangulares são aceitas.
///
/// # Panics
/// Se as linhas tiverem comprimentos diferentes.
pub fn max_weight_assignment(weights: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let rows = weights.len();
    let cols = weights.first().map(Vec::len).unwrap_or(0);
    assert!(
        weights.iter().all(|row| row.len() == cols),
        "a matriz de similaridade deve ser retangular"
    );
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    if rows <= cols {
        let cost: Vec<Vec<f64>> = weights
            .iter()
            .map(|row| row.iter().map(|w| -w).collect())
            .collect();
        min_cost_assignment(&cost)
    } else {
        // O algoritmo exige linhas <= colunas: resolve a transposta.
        let cost: Vec<Vec<f64>> = (0..cols)
            .map(|c| (0..rows).map(|r| -weights[r][c]).collect())
            .collect();
        let mut pairs: Vec<(usize, usize)> = min_cost_assignment(&cost)
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

/// Soma dos pesos de uma atribuição.
pub fn assignment_weight(weights: &[Vec<f64>], pairs: &[(usize, usize)]) -> f64 {
    pairs.iter().map(|&(r, c)| weights[r][c]).sum()
}

/// Atribuição de custo mínimo para `n <= m` (todas as linhas são atribuídas).
///
/// Indexação interna começa em 1; a coluna 0 é a coluna fictícia do caminho aumentante.
fn min_cost_assignment(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let n = cost.len();
    let m = cost[0].len();
    debug_assert!(n <= m);

    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    // row_of[j]: linha (base 1) atribuída à coluna j; 0 = livre
    let mut row_of = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        row_of[0] = i;
        let mut j0 = 0usize;
        let mut min_slack = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = row_of[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if reduced < min_slack[j] {
                    min_slack[j] = reduced;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[row_of[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }

            j0 = j1;
            if row_of[j0] == 0 {
                break;
            }
        }

        // Inverte o caminho aumentante
        loop {
            let j1 = way[j0];
            row_of[j0] = row_of[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=m)
        .filter(|&j| row_of[j] != 0)
        .map(|j| (row_of[j] - 1, j - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beats_greedy() {
        let weights = vec![vec![0.8, 0.6], vec![0.7, 0.0]];
        let pairs = max_weight_assignment(&weights);
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
        assert!((assignment_weight(&weights, &pairs) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_rectangular_more_rows() {
        let weights = vec![vec![1.0], vec![3.0], vec![2.0]];
        assert_eq!(max_weight_assignment(&weights), vec![(1, 0)]);
    }

    #[test]
    fn test_rectangular_more_cols() {
        let weights = vec![vec![0.1, 0.9, 0.5], vec![0.2, 0.8, 0.1]];
        let pairs = max_weight_assignment(&weights);
        // 0.5 + 0.8 supera 0.9 + 0.2
        assert_eq!(pairs, vec![(0, 2), (1, 1)]);
        assert!((assignment_weight(&weights, &pairs) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty() {
        assert!(max_weight_assignment(&[]).is_empty());
        assert!(max_weight_assignment(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_identity_is_optimal_for_diagonal() {
        let weights = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        assert_eq!(max_weight_assignment(&weights), vec![(0, 0), (1, 1), (2, 2)]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn permutations(n: usize) -> Vec<Vec<usize>> {
            if n == 0 {
                return vec![vec![]];
            }
            let mut out = Vec::new();
            for perm in permutations(n - 1) {
                for pos in 0..=perm.len() {
                    let mut p = perm.clone();
                    p.insert(pos, n - 1);
                    out.push(p);
                }
            }
            out
        }

        proptest! {
            #[test]
            fn matches_brute_force_on_square_matrices(
                weights in (1usize..6).prop_flat_map(|n| {
                    prop::collection::vec(prop::collection::vec(0.0f64..1.0, n), n)
                })
            ) {
                let n = weights.len();
                let best = permutations(n)
                    .iter()
                    .map(|p| (0..n).map(|r| weights[r][p[r]]).sum::<f64>())
                    .fold(f64::NEG_INFINITY, f64::max);
                let pairs = max_weight_assignment(&weights);
                prop_assert_eq!(pairs.len(), n);
                prop_assert!((assignment_weight(&weights, &pairs) - best).abs() < 1e-9);
            }
        }
    }
}
