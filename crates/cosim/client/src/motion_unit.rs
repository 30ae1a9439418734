use std::collections::HashMap;

use cosim_shared::{
    model::{AvatarDescription, BoolResponse, Instruction, SimulationResult, SimulationState},
    protocol::{unexpected, MotionUnitRequest, MotionUnitResponse, Operation},
    AccessResult, ClientConfig, MotionUnitAccess, ServiceAddress,
};

use crate::rpc::RpcClient;

/// Motion unit served by a remote host, reached over TCP.
#[derive(Debug)]
pub struct RemoteMotionUnit {
    client: RpcClient<MotionUnitRequest, MotionUnitResponse>,
}

impl RemoteMotionUnit {
    pub fn connect(config: &ClientConfig) -> AccessResult<Self> {
        Ok(Self {
            client: RpcClient::connect(config)?,
        })
    }

    pub fn connect_to(address: ServiceAddress) -> AccessResult<Self> {
        Self::connect(&ClientConfig::for_address(address))
    }

    pub fn address(&self) -> &ServiceAddress {
        self.client.address()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn reconnect(&mut self) -> AccessResult<()> {
        self.client.reconnect()
    }

    fn call_bool(&mut self, request: MotionUnitRequest) -> AccessResult<BoolResponse> {
        let operation = request.operation();
        match self.client.call(request)? {
            MotionUnitResponse::Bool(response) => Ok(response),
            other => Err(unexpected(operation, &other)),
        }
    }
}

impl MotionUnitAccess for RemoteMotionUnit {
    fn initialize(
        &mut self,
        description: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> AccessResult<BoolResponse> {
        self.call_bool(MotionUnitRequest::Initialize {
            description: description.clone(),
            properties: properties.clone(),
        })
    }

    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> AccessResult<BoolResponse> {
        self.call_bool(MotionUnitRequest::AssignInstruction {
            instruction: instruction.clone(),
            state: state.clone(),
        })
    }

    fn abort(&mut self, instruction_id: &str) -> AccessResult<BoolResponse> {
        self.call_bool(MotionUnitRequest::Abort {
            instruction_id: instruction_id.to_string(),
        })
    }

    fn do_step(&mut self, time: f64, state: &SimulationState) -> AccessResult<SimulationResult> {
        match self.client.call(MotionUnitRequest::DoStep {
            time,
            state: state.clone(),
        })? {
            MotionUnitResponse::Step(result) => Ok(result),
            other => Err(unexpected("do_step", &other)),
        }
    }

    fn create_checkpoint(&mut self) -> AccessResult<Vec<u8>> {
        match self.client.call(MotionUnitRequest::CreateCheckpoint)? {
            MotionUnitResponse::Checkpoint(data) => Ok(data),
            other => Err(unexpected("create_checkpoint", &other)),
        }
    }

    fn restore_checkpoint(&mut self, data: &[u8]) -> AccessResult<BoolResponse> {
        self.call_bool(MotionUnitRequest::RestoreCheckpoint {
            data: data.to_vec(),
        })
    }

    fn execute_function(
        &mut self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> AccessResult<HashMap<String, String>> {
        match self.client.call(MotionUnitRequest::ExecuteFunction {
            name: name.to_string(),
            parameters: parameters.clone(),
        })? {
            MotionUnitResponse::Function(values) => Ok(values),
            other => Err(unexpected("execute_function", &other)),
        }
    }
}
