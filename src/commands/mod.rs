pub mod extract;
pub mod import;
pub mod sources;
pub mod status;
pub mod unlock;

use crate::cli::ConfirmArgs;
use crate::remediation::{AssumeYes, Decline, Operator, Prompt};

fn operator(confirm: &ConfirmArgs) -> Box<dyn Operator> {
    if confirm.yes {
        Box::new(AssumeYes)
    } else if confirm.no_input {
        Box::new(Decline)
    } else {
        Box::new(Prompt)
    }
}
