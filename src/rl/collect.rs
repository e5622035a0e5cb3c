use colored::Colorize;

use crate::env::Environment;

use super::{Policy, ReplayBuffer, Trajectory};

/// Runs one rollout step: reads the current observation, asks the policy
/// for an action, steps the environment and moves the resulting
/// trajectory into the buffer.
pub fn collect_step<E: Environment, P: Policy>(
    env: &mut E,
    policy: &mut P,
    buffer: &mut ReplayBuffer,
    discount: f32,
) {
    let observation = env.observation();
    let action = policy.action(observation.view());
    let snapshot = env.step(action);

    buffer.add(Trajectory {
        observation,
        action,
        reward: snapshot.reward,
        next_observation: snapshot.observation,
        discount,
        terminal: snapshot.terminal,
    });
}

/// Repeats [`collect_step`] `steps` times. Used for the warmup phase and
/// for in-loop collection between training updates.
pub fn collect_data<E: Environment, P: Policy>(
    env: &mut E,
    policy: &mut P,
    buffer: &mut ReplayBuffer,
    steps: usize,
    discount: f32,
    verbose: bool,
) {
    for step in 0..steps {
        collect_step(env, policy, buffer, discount);

        if verbose && (step + 1) % 1_000 == 0 {
            println!(
                "{}",
                format!("collected {}/{steps} transitions", step + 1).dimmed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ClassifyEnv;
    use crate::rl::RandomPolicy;
    use ndarray::{Array1, Array2};

    fn small_setup() -> (ClassifyEnv, RandomPolicy, ReplayBuffer) {
        let x = Array2::from_shape_fn((10, 1), |(row, _)| row as f32);
        // All-minority labels keep rewards unambiguous
        let y = Array1::from_elem(10, 1);
        let env = ClassifyEnv::with_options(x, y, 0.2, false, 0).unwrap();
        (env, RandomPolicy::new(0), ReplayBuffer::new(10).unwrap())
    }

    #[test]
    fn each_step_appends_one_trajectory() {
        let (mut env, mut policy, mut buffer) = small_setup();

        assert_eq!(buffer.len(), 0);
        collect_step(&mut env, &mut policy, &mut buffer, 1.0);
        assert_eq!(buffer.len(), 1);
        collect_step(&mut env, &mut policy, &mut buffer, 1.0);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn collection_respects_buffer_capacity() {
        let (mut env, mut policy, mut buffer) = small_setup();

        collect_data(&mut env, &mut policy, &mut buffer, 1, 1.0, false);
        assert_eq!(buffer.len(), 1);

        collect_data(&mut env, &mut policy, &mut buffer, 3, 1.0, false);
        assert_eq!(buffer.len(), 4);

        collect_data(&mut env, &mut policy, &mut buffer, 12, 1.0, false);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn trajectories_pair_observation_with_next_row() {
        let (mut env, mut policy, mut buffer) = small_setup();
        collect_data(&mut env, &mut policy, &mut buffer, 3, 0.9, false);

        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let batch = buffer.sample(3, &mut rng).unwrap();
        for trajectory in batch {
            assert!(trajectory.terminal);
            assert_eq!(trajectory.discount, 0.9);
            assert!(trajectory.reward == 1.0 || trajectory.reward == -1.0);
        }
    }
}
